//! Sample wow API payloads

use serde_json::{Value, json};

/// Sample MP3 body served for clip downloads
pub const SAMPLE_AUDIO: &[u8] = b"ID3\x04\x00wow";

/// One wow record whose audio lives under `base_url`
pub fn wow(base_url: &str, index: usize) -> Value {
    json!({
        "movie": "Wedding Crashers",
        "year": 2005,
        "release_date": "2005-07-15",
        "director": "David Dobkin",
        "character": "John Beckwith",
        "movie_duration": "01:59:00",
        "timestamp": format!("00:5{}:25", index % 10),
        "full_line": format!("Wow number {}.", index),
        "current_wow_in_movie": index,
        "total_wows_in_movie": 5,
        "poster": "https://img.example/wedding-crashers.jpg",
        "video": {"1080p": "https://v.example/1080.mp4"},
        "audio": format!("{}/audio/{}.mp3", base_url, index)
    })
}

/// `count` wow records as the API returns them
pub fn wows(base_url: &str, count: usize) -> Value {
    Value::Array((1..=count).map(|index| wow(base_url, index)).collect())
}
