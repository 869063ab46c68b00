// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Two-layer channel demo: scrolling color bars under a half-opacity
//! white wipe, with a sine tone ramping in. Needs a working EGL/GL 3.3
//! stack.
//!
//! ```text
//! cargo run -p castmix --example color_bars
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use castmix::{
    DataFrame, Frame, FrameMixer, FrameTransform, GlDevice, MixerSettings, PixelFormatDesc,
    VideoFormat,
};

const BARS: [[u8; 4]; 7] = [
    [180, 180, 180, 255], // white
    [0, 180, 180, 255],   // yellow
    [180, 180, 0, 255],   // cyan
    [0, 180, 0, 255],     // green
    [180, 0, 180, 255],   // magenta
    [0, 0, 180, 255],     // red
    [180, 0, 0, 255],     // blue
];

fn bars_frame(device: &GlDevice, format: &VideoFormat, tick: usize) -> castmix::Result<Frame> {
    let mut frame = DataFrame::alloc(
        device,
        1,
        PixelFormatDesc::bgra(format.width, format.height),
    )?;

    let mut pixels = vec![0u8; format.size];
    let bar_width = format.width / BARS.len();
    for y in 0..format.height {
        for x in 0..format.width {
            let shifted = (x + tick * 4) % format.width;
            let bar = (shifted / bar_width).min(BARS.len() - 1);
            let offset = (y * format.width + x) * 4;
            pixels[offset..offset + 4].copy_from_slice(&BARS[bar]);
        }
    }
    frame.planes()[0].write(&pixels)?;

    let samples = format.audio_samples_per_frame;
    let tone: Vec<i32> = (0..samples)
        .map(|n| {
            let t = (tick * samples + n) as f64 / 48_000.0;
            ((t * 440.0 * std::f64::consts::TAU).sin() * 1e8) as i32
        })
        .collect();
    frame.set_audio(tone);

    Ok(Frame::Data(Arc::new(frame)))
}

fn wipe_frame(device: &GlDevice, format: &VideoFormat) -> castmix::Result<Frame> {
    let mut frame = DataFrame::alloc(
        device,
        2,
        PixelFormatDesc::bgra(format.width, format.height),
    )?;
    frame.planes()[0].write(&vec![255u8; format.size])?;
    Ok(Frame::Data(Arc::new(frame)))
}

fn main() -> castmix::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = MixerSettings::default();
    let device = GlDevice::new(&settings)?;
    let format = VideoFormat::p720_50();
    let (mixer, frames) = FrameMixer::new(&device, format.clone(), &settings)?;

    // Wipe layer: slide in from the left over two seconds at half
    // opacity, audio ramping alongside.
    let mut wipe = FrameTransform::default();
    wipe.opacity = 0.5;
    wipe.fill_scale = [0.5, 1.0];
    mixer.set_image_transform(Some(2), wipe, 100, "ease_out_cubic")?;

    let mut fade_in = FrameTransform::default();
    fade_in.volume = 1.0;
    mixer.set_audio_transform(Some(1), fade_in, 100, "linear")?;

    let consumer = std::thread::spawn(move || {
        let mut received = 0usize;
        while let Ok(frame) = frames.recv() {
            received += 1;
            if received % 50 == 0 {
                tracing::info!(
                    received,
                    image_bytes = frame.image.len(),
                    audio_samples = frame.audio.len(),
                    "frames consumed"
                );
            }
        }
        received
    });

    for tick in 0..250 {
        let mut input = BTreeMap::new();
        input.insert(1, bars_frame(&device, &format, tick)?);
        input.insert(2, wipe_frame(&device, &format)?);
        mixer.send(input)?;
    }

    let diag = mixer.diag();
    drop(mixer);
    let received = consumer.join().unwrap_or_default();

    tracing::info!(
        received,
        last_frame_time_us = diag.frame_time_us(),
        black_frames = diag.black_frames(),
        "channel finished"
    );
    Ok(())
}
