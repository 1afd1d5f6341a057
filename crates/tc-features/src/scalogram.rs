use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use tc_core::error::{PipelineError, PipelineResult};

/// Centre frequency of the real Morlet mother wavelet.
const MORLET_W0: f64 = 5.0;

/// Wavelet support, in units of scale, on each side of the centre.
const SUPPORT: f64 = 4.0;

/// Real Morlet wavelet `exp(-t²/2)·cos(5t)`.
#[inline]
fn morlet(t: f64) -> f64 {
    (-0.5 * t * t).exp() * (MORLET_W0 * t).cos()
}

/// Multi-scale energy of a fixed-length signal.
///
/// For each scale `s`, the continuous wavelet transform of the signal with a
/// real Morlet wavelet dilated by `s` (normalised by `1/√s`) is computed by FFT
/// convolution; the scalar reported is the mean squared coefficient.
///
/// Plans, kernel spectra and scratch buffers are allocated once in the
/// constructor and reused for every signal.
///
/// # Example
/// ```
/// use tc_features::scalogram::Scalogram;
/// let mut scalo = Scalogram::new(64, &[2, 4, 8]).unwrap();
/// let energy = scalo.energies(&[0.0; 64]).unwrap();
/// assert_eq!(energy, vec![0.0; 3]);
/// ```
pub struct Scalogram {
    signal_len: usize,
    fft_size: usize,
    /// Half support (in samples) of each scale's kernel.
    half_support: Vec<usize>,
    /// FFT of each scale's kernel, zero-padded to `fft_size`.
    kernels: Vec<Vec<Complex<f64>>>,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    input_buf: Vec<f64>,
    signal_spectrum: Vec<Complex<f64>>,
    product: Vec<Complex<f64>>,
    output_buf: Vec<f64>,
}

impl Scalogram {
    /// Prepare a scalogram for signals of `signal_len` samples.
    ///
    /// # Errors
    /// `Configuration` if `signal_len` is zero, `scales` is empty, or a scale is zero.
    pub fn new(signal_len: usize, scales: &[usize]) -> PipelineResult<Self> {
        if signal_len == 0 {
            return Err(PipelineError::Configuration(
                "scalogramme sur un signal vide".into(),
            ));
        }
        if scales.is_empty() || scales.contains(&0) {
            return Err(PipelineError::Configuration(
                "échelles du scalogramme invalides".into(),
            ));
        }

        // Beyond the signal length the kernel never overlaps a sample.
        let half_support: Vec<usize> = scales
            .iter()
            .map(|&s| ((SUPPORT * s as f64).ceil() as usize).min(signal_len))
            .collect();
        let max_half = half_support.iter().copied().max().unwrap_or(0);
        let fft_size = (signal_len + 2 * max_half + 1).next_power_of_two();

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut input_buf = forward.make_input_vec();
        let mut kernels = Vec::with_capacity(scales.len());
        for (&scale, &half) in scales.iter().zip(&half_support) {
            let s = scale as f64;
            let norm = 1.0 / s.sqrt();
            input_buf.fill(0.0);
            // Kernel centred at `half`: g[j] = ψ((j − half) / s) / √s
            for (j, slot) in input_buf.iter_mut().take(2 * half + 1).enumerate() {
                let t = (j as f64 - half as f64) / s;
                *slot = norm * morlet(t);
            }
            let mut spectrum = forward.make_output_vec();
            forward
                .process(&mut input_buf, &mut spectrum)
                .map_err(|e| PipelineError::Configuration(format!("FFT du noyau : {e}")))?;
            kernels.push(spectrum);
        }

        Ok(Self {
            signal_len,
            fft_size,
            half_support,
            kernels,
            signal_spectrum: forward.make_output_vec(),
            product: forward.make_output_vec(),
            output_buf: inverse.make_output_vec(),
            input_buf,
            forward,
            inverse,
        })
    }

    /// Signal length this scalogram was prepared for.
    #[must_use]
    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    /// One energy per scale. Signals shorter than `signal_len` are zero-padded,
    /// longer ones truncated.
    ///
    /// # Errors
    /// `DataShapeMismatch` if realfft rejects a scratch buffer.
    pub fn energies(&mut self, signal: &[f64]) -> PipelineResult<Vec<f64>> {
        let n = self.signal_len.min(signal.len());
        self.input_buf.fill(0.0);
        self.input_buf[..n].copy_from_slice(&signal[..n]);

        self.forward
            .process(&mut self.input_buf, &mut self.signal_spectrum)
            .map_err(|_| PipelineError::DataShapeMismatch {
                expected: self.fft_size,
                found: self.input_buf.len(),
            })?;

        let last = self.product.len() - 1;
        let scale_fft = self.fft_size as f64;
        let mut energies = Vec::with_capacity(self.kernels.len());

        for (kernel, &half) in self.kernels.iter().zip(&self.half_support) {
            for ((p, x), k) in self
                .product
                .iter_mut()
                .zip(&self.signal_spectrum)
                .zip(kernel)
            {
                *p = x * k;
            }
            // DC and Nyquist bins of a real product are real.
            self.product[0].im = 0.0;
            self.product[last].im = 0.0;

            self.inverse
                .process(&mut self.product, &mut self.output_buf)
                .map_err(|_| PipelineError::DataShapeMismatch {
                    expected: self.fft_size,
                    found: self.output_buf.len(),
                })?;

            let coeffs = &self.output_buf[half..half + self.signal_len];
            let energy = coeffs
                .iter()
                .map(|c| {
                    let c = c / scale_fft;
                    c * c
                })
                .sum::<f64>()
                / self.signal_len as f64;
            energies.push(energy);
        }

        Ok(energies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct-sum CWT energy for comparison with the FFT path.
    fn direct_energy(signal: &[f64], scale: usize) -> f64 {
        let s = scale as f64;
        let half = ((SUPPORT * s).ceil() as usize).min(signal.len()) as isize;
        let n = signal.len() as isize;
        let mut total = 0.0;
        for tau in 0..n {
            let mut c = 0.0;
            for k in -half..=half {
                let m = tau + k;
                if (0..n).contains(&m) {
                    c += signal[m as usize] * morlet(k as f64 / s);
                }
            }
            c /= s.sqrt();
            total += c * c;
        }
        total / n as f64
    }

    #[test]
    fn fft_convolution_matches_direct_sum() {
        let signal: Vec<f64> = (0..96)
            .map(|i| ((i * 13) % 17) as f64 * 40.0 + if i % 8 == 0 { 900.0 } else { 0.0 })
            .collect();
        let scales = [2, 4, 8, 16, 32];
        let mut scalo = Scalogram::new(signal.len(), &scales).expect("valid scales");
        let energies = scalo.energies(&signal).expect("fft");
        for (e, &s) in energies.iter().zip(&scales) {
            let expected = direct_energy(&signal, s);
            assert!(
                (e - expected).abs() <= 1e-6 * expected.max(1.0),
                "scale {s}: fft={e} direct={expected}"
            );
        }
    }

    #[test]
    fn buffers_are_reused_without_leaking_state() {
        let mut scalo = Scalogram::new(32, &[2, 4]).expect("valid scales");
        let burst: Vec<f64> = (0..32).map(|i| if i % 4 == 0 { 1000.0 } else { 0.0 }).collect();
        let first = scalo.energies(&burst).expect("fft");
        scalo.energies(&[5.0; 32]).expect("fft");
        assert_eq!(scalo.energies(&burst).expect("fft"), first);
    }

    #[test]
    fn periodic_signal_peaks_near_matching_scale() {
        // Period 8 → Morlet scale ≈ 5·8/(2π) ≈ 6.4, so scale 8 beats 2 and 32.
        let signal: Vec<f64> = (0..240)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 8.0).sin())
            .collect();
        let mut scalo = Scalogram::new(240, &[2, 8, 32]).expect("valid scales");
        let e = scalo.energies(&signal).expect("fft");
        assert!(e[1] > e[0] && e[1] > e[2], "energies: {e:?}");
    }

    #[test]
    fn short_and_long_signals_yield_one_energy_per_scale() {
        let mut scalo = Scalogram::new(16, &[2, 4, 8]).expect("valid scales");
        let long: Vec<f64> = (0..40).map(f64::from).collect();
        let truncated = scalo.energies(&long).expect("fft");
        assert_eq!(truncated, scalo.energies(&long[..16]).expect("fft"));
        let padded = scalo.energies(&[3.0; 5]).expect("fft");
        assert_eq!(padded.len(), 3);
        assert!(padded.iter().all(|e| e.is_finite() && *e > 0.0));
    }

    #[test]
    fn rejects_zero_scale() {
        assert!(Scalogram::new(10, &[0, 2]).is_err());
        assert!(Scalogram::new(0, &[2]).is_err());
    }
}
