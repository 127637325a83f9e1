// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mux playback URL helpers.

const STREAM_BASE: &str = "https://stream.mux.com";
const IMAGE_BASE: &str = "https://image.mux.com";

/// HLS manifest for a playback id.
pub fn stream_url(playback_id: &str) -> String {
    format!("{}/{}.m3u8", STREAM_BASE, playback_id)
}

/// Still thumbnail, optionally taken at `time_seconds` into the video.
pub fn thumbnail_url(playback_id: &str, time_seconds: Option<f64>) -> String {
    match time_seconds {
        Some(t) => format!("{}/{}/thumbnail.jpg?time={}", IMAGE_BASE, playback_id, t),
        None => format!("{}/{}/thumbnail.jpg", IMAGE_BASE, playback_id),
    }
}

pub fn animated_preview_url(playback_id: &str) -> String {
    format!("{}/{}/animated.gif", IMAGE_BASE, playback_id)
}
