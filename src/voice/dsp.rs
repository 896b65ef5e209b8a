// src/voice/dsp.rs - Signal processing primitives for voice features
//
// Windowing, an iterative radix-2 FFT, the mel filterbank + DCT used for
// MFCCs, bark-band loudness for the perceptual features, and an
// autocorrelation pitch detector. All pure compute over in-memory buffers.
use std::f64::consts::PI;

/// Pitch search range in Hz
const PITCH_MIN_HZ: f64 = 50.0;
const PITCH_MAX_HZ: f64 = 500.0;
/// Minimum normalized autocorrelation peak for a frame to count as voiced
const VOICING_THRESHOLD: f64 = 0.3;
/// Bark bands used for perceptual loudness
pub const BARK_BANDS: usize = 24;

/// Hamming window of the given length
pub fn hamming_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f64 / (len - 1) as f64).cos())
        .collect()
}

/// In-place iterative radix-2 FFT. Lengths must be a power of two.
pub fn fft(re: &mut [f64], im: &mut [f64]) {
    let n = re.len();
    debug_assert!(n.is_power_of_two() && im.len() == n);

    // Bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let angle = -2.0 * PI / len as f64;
        let (w_re, w_im) = (angle.cos(), angle.sin());
        let mut i = 0;
        while i < n {
            let (mut cur_re, mut cur_im) = (1.0, 0.0);
            for k in 0..len / 2 {
                let even_re = re[i + k];
                let even_im = im[i + k];
                let odd_re = re[i + k + len / 2] * cur_re - im[i + k + len / 2] * cur_im;
                let odd_im = re[i + k + len / 2] * cur_im + im[i + k + len / 2] * cur_re;

                re[i + k] = even_re + odd_re;
                im[i + k] = even_im + odd_im;
                re[i + k + len / 2] = even_re - odd_re;
                im[i + k + len / 2] = even_im - odd_im;

                let next_re = cur_re * w_re - cur_im * w_im;
                cur_im = cur_re * w_im + cur_im * w_re;
                cur_re = next_re;
            }
            i += len;
        }
        len <<= 1;
    }
}

/// Magnitude spectrum of a windowed frame: bins 0..=N/2
pub fn magnitude_spectrum(frame: &[f64]) -> Vec<f64> {
    let n = frame.len().next_power_of_two();
    let mut re = vec![0.0; n];
    let mut im = vec![0.0; n];
    re[..frame.len()].copy_from_slice(frame);

    fft(&mut re, &mut im);

    (0..=n / 2)
        .map(|k| (re[k] * re[k] + im[k] * im[k]).sqrt())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank over `bins` spectrum bins (0..=N/2)
pub fn mel_filterbank(num_filters: usize, bins: usize, sample_rate: f64) -> Vec<Vec<f64>> {
    let nyquist = sample_rate / 2.0;
    let mel_max = hz_to_mel(nyquist);

    // num_filters + 2 equally spaced mel points mapped back to bin indices
    let points: Vec<f64> = (0..num_filters + 2)
        .map(|i| {
            let hz = mel_to_hz(mel_max * i as f64 / (num_filters + 1) as f64);
            hz / nyquist * (bins - 1) as f64
        })
        .collect();

    (0..num_filters)
        .map(|f| {
            let (left, center, right) = (points[f], points[f + 1], points[f + 2]);
            (0..bins)
                .map(|b| {
                    let b = b as f64;
                    if b >= left && b <= center && center > left {
                        (b - left) / (center - left)
                    } else if b > center && b <= right && right > center {
                        (right - b) / (right - center)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// DCT-II of the input, keeping the first `count` coefficients
pub fn dct_ii(input: &[f64], count: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..count)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (i as f64 + 0.5) / n).cos())
                .sum()
        })
        .collect()
}

/// Bark-band specific loudness of a magnitude spectrum (Zwicker bands)
pub fn bark_loudness(spectrum: &[f64], sample_rate: f64) -> Vec<f64> {
    let nyquist = sample_rate / 2.0;
    let mut energy = vec![0.0; BARK_BANDS];

    for (k, &m) in spectrum.iter().enumerate() {
        let hz = k as f64 / (spectrum.len() - 1) as f64 * nyquist;
        let bark = 13.0 * (0.00076 * hz).atan() + 3.5 * ((hz / 7500.0).powi(2)).atan();
        let band = (bark.floor() as usize).min(BARK_BANDS - 1);
        energy[band] += m * m;
    }

    // Specific loudness per Zwicker's power law
    energy.iter().map(|&e| e.powf(0.23)).collect()
}

/// Autocorrelation pitch estimate for one frame; `None` when unvoiced
pub fn detect_pitch(frame: &[f64], sample_rate: f64) -> Option<f64> {
    let n = frame.len();
    let energy: f64 = frame.iter().map(|x| x * x).sum();
    if energy <= f64::EPSILON {
        return None;
    }

    let min_lag = (sample_rate / PITCH_MAX_HZ).floor() as usize;
    let max_lag = ((sample_rate / PITCH_MIN_HZ).ceil() as usize).min(n - 1);
    if min_lag >= max_lag {
        return None;
    }

    let mut best_lag = 0usize;
    let mut best_corr = 0.0;
    for lag in min_lag..=max_lag {
        let corr: f64 = (0..n - lag).map(|i| frame[i] * frame[i + lag]).sum();
        let normalized = corr / energy;
        if normalized > best_corr {
            best_corr = normalized;
            best_lag = lag;
        }
    }

    if best_corr < VOICING_THRESHOLD || best_lag == 0 {
        return None;
    }

    Some(sample_rate / best_lag as f64)
}
