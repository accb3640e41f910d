//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::input::AudioInput;
use crate::audio::queue::CaptureFeed;
use crate::error::{Result, VaaniError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// CPAL probes ALSA/JACK backends on enumeration and those libraries print
/// harmless but alarming messages straight to fd 2.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` on fd 2. Only called on the startup path,
/// before the pipeline threads exist.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Quiet JACK/ALSA/PipeWire chatter during backend probing.
///
/// Call before the first device is opened.
pub fn suppress_audio_warnings() {
    // SAFETY: only the audio backends read these, and none is loaded yet
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// Pick the configured device, or PipeWire/Pulse, or the system default.
fn find_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host
                .input_devices()
                .map_err(|e| VaaniError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

            for dev in devices {
                if let Ok(dev_name) = dev.name()
                    && dev_name == name
                {
                    return Ok(dev);
                }
            }
            return Err(VaaniError::AudioDeviceNotFound {
                device: name.to_string(),
            });
        }

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VaaniError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched from the thread that owns the
/// `CpalCapture` (start/stop), never from the callback.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone input: one mono stream at a fixed sample rate.
///
/// Tries i16 then f32 at the target rate and a fixed block size; if the device
/// refuses or never fires the callback, falls back to its native format with
/// software down-mixing and resampling.
pub struct CpalCapture {
    device: cpal::Device,
    device_label: String,
    sample_rate: u32,
    block_size: usize,
    stream: Option<SendableStream>,
    callback_count: Arc<AtomicU64>,
}

impl CpalCapture {
    /// Open the input device.
    ///
    /// # Errors
    /// `AudioDeviceNotFound` if the named (or any default) device is missing.
    pub fn open(device_name: Option<&str>, sample_rate: u32, block_size: usize) -> Result<Self> {
        let device = find_device(device_name)?;
        let device_label = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(device = %device_label, sample_rate, block_size, "audio input opened");

        Ok(Self {
            device,
            device_label,
            sample_rate,
            block_size,
            stream: None,
            callback_count: Arc::new(AtomicU64::new(0)),
        })
    }

    fn stream_config(&self, fixed: bool) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: if fixed {
                cpal::BufferSize::Fixed(self.block_size as u32)
            } else {
                cpal::BufferSize::Default
            },
        }
    }

    /// Build a stream in the target format, trying fixed then default buffer size.
    fn build_stream(&self, feed: &Arc<Mutex<CaptureFeed>>) -> Result<cpal::Stream> {
        for fixed in [true, false] {
            let config = self.stream_config(fixed);

            let sink = Arc::clone(feed);
            let counter = Arc::clone(&self.callback_count);
            if let Ok(stream) = self.device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    if let Ok(mut feed) = sink.lock() {
                        feed.deliver(data);
                    }
                },
                report_stream_error,
                None,
            ) {
                return Ok(stream);
            }

            let sink = Arc::clone(feed);
            let counter = Arc::clone(&self.callback_count);
            if let Ok(stream) = self.device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    let converted: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                    if let Ok(mut feed) = sink.lock() {
                        feed.deliver(&converted);
                    }
                },
                report_stream_error,
                None,
            ) {
                return Ok(stream);
            }
        }

        self.build_stream_native(feed)
    }

    /// Build a stream in the device's native format and convert in software.
    fn build_stream_native(&self, feed: &Arc<Mutex<CaptureFeed>>) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| VaaniError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        tracing::info!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "using native audio format, converting in software"
        );

        let sink = Arc::clone(feed);
        let counter = Arc::clone(&self.callback_count);

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let converted =
                            convert_to_mono(data, native_channels, native_rate, target_rate);
                        if let Ok(mut feed) = sink.lock() {
                            feed.deliver(&converted);
                        }
                    },
                    report_stream_error,
                    None,
                )
                .map_err(|e| VaaniError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let i16_data: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                        let converted =
                            convert_to_mono(&i16_data, native_channels, native_rate, target_rate);
                        if let Ok(mut feed) = sink.lock() {
                            feed.deliver(&converted);
                        }
                    },
                    report_stream_error,
                    None,
                )
                .map_err(|e| VaaniError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(VaaniError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. Try another device with --device.",
                    fmt
                ),
            }),
        }
    }
}

/// Driver errors are reported but never fatal once the stream is running.
fn report_stream_error(err: cpal::StreamError) {
    tracing::error!(error = %err, "audio stream error");
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn convert_to_mono(samples: &[i16], channels: usize, source_rate: u32, target_rate: u32) -> Vec<i16> {
    let mono: Vec<i16> = if channels <= 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    resample(&mono, source_rate, target_rate)
}

/// Linear-interpolation resampler.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

impl AudioInput for CpalCapture {
    fn start(&mut self, feed: CaptureFeed) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let feed = Arc::new(Mutex::new(feed));
        let stream = self.build_stream(&feed)?;
        stream.play().map_err(|e| VaaniError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Some PipeWire-ALSA setups accept the config but never deliver data.
        std::thread::sleep(Duration::from_millis(200));

        let stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            drop(stream);
            tracing::warn!("preferred stream delivered no audio, retrying in native format");
            let native = self.build_stream_native(&feed)?;
            native.play().map_err(|e| VaaniError::AudioCapture {
                message: format!("Failed to start native audio stream: {}", e),
            })?;
            native
        } else {
            stream
        };

        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(sendable) = self.stream.take() {
            sendable.0.pause().map_err(|e| VaaniError::AudioCapture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
            tracing::debug!(device = %self.device_label, "audio input stopped");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.device_label
    }
}
