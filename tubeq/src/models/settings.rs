use std::collections::HashMap;
use std::path::PathBuf;

use sqlx::{Row, SqlitePool};

use super::{AudioCodec, AudioFormat, AudioLanguage, AudioOnly, Container, Height, Preset, VideoCodec};
use crate::namer::{MIN_TITLE_FLOOR, NamingPolicy};

pub struct Settings;

impl Settings {
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    /// Like `get`, but blank values count as unset.
    pub async fn get_nonempty(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(Self::get(pool, key)
            .await?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value"
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_all(pool: &SqlitePool) -> Result<HashMap<String, String>, sqlx::Error> {
        let rows = sqlx::query("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.get("key"), r.get("value"))).collect())
    }

    pub async fn get_extractor_args(pool: &SqlitePool) -> Result<String, sqlx::Error> {
        Ok(Self::get(pool, "extractor_args")
            .await?
            .unwrap_or_default())
    }

    pub async fn get_cookies_file(pool: &SqlitePool) -> Result<Option<PathBuf>, sqlx::Error> {
        Ok(Self::get_nonempty(pool, "cookies_file").await?.map(PathBuf::from))
    }

    pub async fn naming_policy(pool: &SqlitePool) -> Result<NamingPolicy, sqlx::Error> {
        let values = Self::get_all(pool).await?;
        let defaults = NamingPolicy::default();
        Ok(NamingPolicy {
            safe_max_path: parse_or(&values, "safe_max_path", defaults.safe_max_path),
            min_title_len: parse_or(&values, "min_title_len", defaults.min_title_len).max(MIN_TITLE_FLOOR)
        })
    }

    /// Default preset for new jobs. Invalid stored values fall back to defaults.
    pub async fn load_preset(pool: &SqlitePool) -> Result<Preset, sqlx::Error> {
        let values = Self::get_all(pool).await?;
        Ok(preset_from_values(&values))
    }

    pub async fn save_preset(pool: &SqlitePool, preset: &Preset) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for (key, value) in preset_to_values(preset) {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr + Copy>(values: &HashMap<String, String>, key: &str, default: T) -> T {
    match values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring invalid setting {}={:?}", key, raw);
            default
        }),
        None => default
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn preset_from_values(values: &HashMap<String, String>) -> Preset {
    let get = |key: &str| values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
    let mut preset = Preset::default();

    if let Some(raw) = get("quality") {
        match Height::parse(raw) {
            Ok(height) => preset.height = height,
            Err(e) => tracing::warn!("ignoring stored quality {:?}: {}", raw, e)
        }
    }
    if let Some(raw) = get("vcodec") {
        preset.vcodec = VideoCodec::normalize(raw);
    }
    if let Some(raw) = get("acodec") {
        preset.acodec = AudioCodec::normalize(raw);
    }
    if let Some(raw) = get("audio_lang") {
        match AudioLanguage::parse(raw) {
            Ok(lang) => preset.audio_lang = lang,
            Err(e) => tracing::warn!("ignoring stored audio language: {}", e)
        }
    }
    if let Some(raw) = get("container") {
        preset.container = Container::normalize(raw);
    }
    if let Some(raw) = get("outdir") {
        preset.outdir = PathBuf::from(raw);
    }
    if let Some(raw) = get("outtmpl") {
        preset.outtmpl = raw.to_string();
    }
    preset.cookies = get("cookies").map(PathBuf::from);
    preset.audio_only = get("audio_only").is_some_and(parse_bool);

    let format = match get("audio_format") {
        Some(raw) => AudioFormat::parse(raw).unwrap_or_else(|| {
            tracing::warn!("ignoring stored audio format {:?}", raw);
            AudioFormat::default()
        }),
        None => AudioFormat::default()
    };
    let bitrate = get("audio_quality").and_then(|raw| raw.parse::<u32>().ok());
    preset.audio = AudioOnly::new(format, bitrate).unwrap_or_else(|e| {
        tracing::warn!("ignoring stored audio quality: {}", e);
        AudioOnly::new(format, None).unwrap_or_default()
    });

    preset.playlist = get("download_playlist").is_some_and(parse_bool);
    preset.subtitles.write = get("write_subtitles").is_some_and(parse_bool);
    preset.subtitles.embed = get("embed_subtitles").is_some_and(parse_bool);
    preset.subtitles.langs = get("subtitle_langs")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|lang| !lang.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Err(e) = preset.validate() {
        tracing::warn!("stored preset is invalid ({}), using the default template", e);
        preset.outtmpl = Preset::default().outtmpl;
    }

    preset
}

fn preset_to_values(preset: &Preset) -> Vec<(&'static str, String)> {
    vec![
        ("quality", preset.height.get().to_string()),
        ("vcodec", preset.vcodec.as_str().to_string()),
        ("acodec", preset.acodec.as_str().to_string()),
        ("audio_lang", preset.audio_lang.to_string()),
        ("container", preset.container.as_str().to_string()),
        ("outdir", preset.outdir.to_string_lossy().to_string()),
        ("outtmpl", preset.outtmpl.clone()),
        (
            "cookies",
            preset
                .cookies
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default()
        ),
        ("audio_only", preset.audio_only.to_string()),
        ("audio_format", preset.audio.format.codec().to_string()),
        (
            "audio_quality",
            preset.audio.bitrate.map(|b| b.to_string()).unwrap_or_default()
        ),
        ("download_playlist", preset.playlist.to_string()),
        ("write_subtitles", preset.subtitles.write.to_string()),
        ("embed_subtitles", preset.subtitles.embed.to_string()),
        (
            "subtitle_langs",
            preset.subtitles.langs.iter().cloned().collect::<Vec<_>>().join(",")
        )
    ]
}
