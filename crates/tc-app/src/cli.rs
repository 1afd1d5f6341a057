use std::path::PathBuf;

use clap::Parser;

/// tclass: encrypted traffic classification (crypto-mining detection).
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Regénérer les features profilées (sinon lecture du cache).
    #[arg(short, long, default_value_t = false)]
    pub profile: bool,

    /// Entraîner et sauvegarder de nouveaux modèles (sinon chargement).
    #[arg(short = 'c', long, default_value_t = false)]
    pub classification: bool,

    /// Méthode : 0 multimethod, 1 SVM, 2 réseau de neurones, 3 centroïde, 4 gaussienne.
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub method: Option<u8>,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Écrire les scores au format JSON dans ce fichier.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Afficher la matrice de confusion.
    #[arg(long, default_value_t = false)]
    pub matrix: bool,

    /// Masquer les cellules nulles de la matrice.
    #[arg(long, default_value_t = false)]
    pub hide_zeroes: bool,

    /// Masquer la diagonale de la matrice.
    #[arg(long, default_value_t = false)]
    pub hide_diagonal: bool,

    /// Masquer les cellules inférieures ou égales à ce seuil.
    #[arg(long)]
    pub hide_threshold: Option<f64>,

    /// Afficher la part des prédictions sous / au-dessus de cette classe.
    #[arg(long)]
    pub share_boundary: Option<u32>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}
