//! 本地音频设备（cpal）：固定时长录音与 MP3 播放
//!
//! cpal 的 Stream 不是 Send，录音与播放都在 spawn_blocking 线程里完成。

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Device;
use rubato::{FftFixedIn, Resampler};

use crate::voice::{Microphone, Speaker, VoiceError};

fn audio_err(e: impl std::fmt::Display) -> VoiceError {
    VoiceError::Audio(e.to_string())
}

fn pick_input(name: Option<&str>) -> Result<Device, VoiceError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()
            .map_err(audio_err)?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| VoiceError::Audio(format!("input device not found: {wanted}"))),
        None => host
            .default_input_device()
            .ok_or_else(|| VoiceError::Audio("no input device available".to_string())),
    }
}

fn pick_output(name: Option<&str>) -> Result<Device, VoiceError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .output_devices()
            .map_err(audio_err)?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| VoiceError::Audio(format!("output device not found: {wanted}"))),
        None => host
            .default_output_device()
            .ok_or_else(|| VoiceError::Audio("no output device available".to_string())),
    }
}

const RESAMPLE_CHUNK: usize = 1024;

/// 单声道重采样（rubato FFT），输出长度按采样率比例截取，已去掉滤波器延迟
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, VoiceError> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from == 0 || to == 0 {
        return Err(VoiceError::Audio(format!("invalid sample rates {from} -> {to}")));
    }

    let mut resampler = FftFixedIn::<f64>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
        .map_err(|e| VoiceError::Audio(format!("resampler init failed: {e}")))?;
    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * u64::from(to) / u64::from(from)) as usize;

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output: Vec<f64> = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let mut offset = 0;
    // 末尾补零，直到延迟之后的样本全部输出
    while output.len() < expected + delay {
        let mut chunk = vec![0.0f64; RESAMPLE_CHUNK];
        if offset < input.len() {
            let end = (offset + RESAMPLE_CHUNK).min(input.len());
            chunk[..end - offset].copy_from_slice(&input[offset..end]);
        }
        offset += RESAMPLE_CHUNK;
        let frames = resampler
            .process(&[chunk], None)
            .map_err(|e| VoiceError::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&frames[0]);
    }

    Ok(output[delay..delay + expected]
        .iter()
        .map(|&s| s as f32)
        .collect())
}

/// 多声道交错样本取平均为单声道
fn downmix(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    data.chunks(channels.max(1))
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
}

/// f32 样本编码为 16-bit 单声道 WAV
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, VoiceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(audio_err)?;
        for &sample in samples {
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(sample_i16).map_err(audio_err)?;
        }
        writer.finalize().map_err(audio_err)?;
    }
    Ok(cursor.into_inner())
}

/// MP3 解码为单声道 f32 样本，返回 (样本, 采样率)
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32), VoiceError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                let channels = frame.channels.max(1);
                samples.extend(
                    frame
                        .data
                        .chunks(channels)
                        .map(|c| c.iter().map(|&s| f32::from(s) / 32768.0).sum::<f32>() / c.len() as f32),
                );
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(VoiceError::Audio(format!("MP3 decode error: {e}"))),
        }
    }
    Ok((samples, sample_rate))
}

/// 录音设备
pub struct CpalMicrophone {
    device_name: Option<String>,
    sample_rate: u32,
}

impl CpalMicrophone {
    pub fn new(device_name: Option<String>, sample_rate: u32) -> Self {
        Self {
            device_name,
            sample_rate,
        }
    }

    fn record_blocking(
        device_name: Option<String>,
        target_rate: u32,
        duration: Duration,
    ) -> Result<Vec<u8>, VoiceError> {
        let device = pick_input(device_name.as_deref())?;
        let config = device.default_input_config().map_err(audio_err)?.config();
        let channels = usize::from(config.channels);
        let device_rate = config.sample_rate.0;

        let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
        let sink = buffer.clone();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend(downmix(data, channels));
                    }
                },
                |err| tracing::error!(error = %err, "audio capture error"),
                None,
            )
            .map_err(audio_err)?;
        stream.play().map_err(audio_err)?;
        std::thread::sleep(duration);
        drop(stream);

        let captured = buffer.lock().map(|b| b.clone()).unwrap_or_default();
        tracing::debug!(samples = captured.len(), device_rate, "recording finished");
        let mono = resample(&captured, device_rate, target_rate)?;
        samples_to_wav(&mono, target_rate)
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn record(&self, duration: Duration) -> Result<Vec<u8>, VoiceError> {
        let device_name = self.device_name.clone();
        let rate = self.sample_rate;
        tokio::task::spawn_blocking(move || Self::record_blocking(device_name, rate, duration))
            .await
            .map_err(audio_err)?
    }
}

/// 播放设备
pub struct CpalSpeaker {
    device_name: Option<String>,
}

impl CpalSpeaker {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn play_blocking(device_name: Option<String>, mp3: Vec<u8>) -> Result<(), VoiceError> {
        let (samples, source_rate) = decode_mp3(&mp3)?;
        if samples.is_empty() {
            return Ok(());
        }
        let device = pick_output(device_name.as_deref())?;
        let config = device.default_output_config().map_err(audio_err)?.config();
        let channels = usize::from(config.channels);
        let device_rate = config.sample_rate.0;
        let samples = Arc::new(resample(&samples, source_rate, device_rate)?);

        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (src, pos, done) = (samples.clone(), position.clone(), finished.clone());
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels.max(1)) {
                        let i = pos.fetch_add(1, Ordering::Relaxed);
                        let sample = match src.get(i) {
                            Some(s) => *s,
                            None => {
                                done.store(true, Ordering::Relaxed);
                                0.0
                            }
                        };
                        frame.iter_mut().for_each(|out| *out = sample);
                    }
                },
                |err| tracing::error!(error = %err, "audio playback error"),
                None,
            )
            .map_err(audio_err)?;
        stream.play().map_err(audio_err)?;

        let expected = Duration::from_millis(samples.len() as u64 * 1000 / u64::from(device_rate.max(1)));
        let deadline = Instant::now() + expected + Duration::from_millis(500);
        while !finished.load(Ordering::Relaxed) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");
        Ok(())
    }
}

#[async_trait]
impl Speaker for CpalSpeaker {
    async fn play(&self, audio: Vec<u8>) -> Result<(), VoiceError> {
        let device_name = self.device_name.clone();
        tokio::task::spawn_blocking(move || Self::play_blocking(device_name, audio))
            .await
            .map_err(audio_err)?
    }
}
