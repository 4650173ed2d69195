/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use std::fs;

use narrasync::app_config::{Config, LogLevel, SynthesisProviderKind};
use narrasync::engine::EngineConfig;
use narrasync::providers::AudioFormat;
use crate::common;

/// A missing config file is created with the defaults
#[test]
fn test_load_or_create_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;
    assert!(path.exists());
    assert_eq!(config.segmentation.max_chunk_chars, 12);

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(written["synthesis"]["provider"], "http");
    assert_eq!(written["synthesis"]["audio_format"], "mp3");
    assert_eq!(written["log_level"], "info");
    Ok(())
}

/// An existing config file is read, missing keys fall back to defaults
#[test]
fn test_load_or_create_withExistingFile_shouldReadIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{
            "segmentation": { "max_chunk_chars": 42 },
            "synthesis": { "provider": "mock", "voice_id": "Joanna", "audio_format": "ogg_vorbis" },
            "log_level": "warn"
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;
    assert_eq!(config.segmentation.max_chunk_chars, 42);
    assert_eq!(config.synthesis.provider, SynthesisProviderKind::Mock);
    assert_eq!(config.synthesis.voice_id, "Joanna");
    assert_eq!(config.synthesis.engine, "neural");
    assert_eq!(config.synthesis.audio_format, AudioFormat::OggVorbis);
    assert_eq!(config.log_level, LogLevel::Warn);
    assert!(config.validate().is_ok());
    Ok(())
}

/// Broken JSON is reported, not replaced
#[test]
fn test_load_or_create_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    assert_eq!(fs::read_to_string(&path)?, "{ not json");
    Ok(())
}

/// Test configuration validation
#[test]
fn test_validate_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = common::mock_app_config(std::path::Path::new("out"));
    assert!(config.validate().is_ok());

    config.segmentation.max_chunk_chars = 0;
    assert!(config.validate().is_err());
    config.segmentation.max_chunk_chars = 12;

    config.synthesis.poll_interval_ms = 0;
    assert!(config.validate().is_err());
    config.synthesis.poll_interval_ms = 5;

    config.synthesis.voice_id = "  ".to_string();
    assert!(config.validate().is_err());
    config.synthesis.voice_id = "Matthew".to_string();

    config.synthesis.provider = SynthesisProviderKind::Http;
    config.synthesis.bucket = "narration-bucket".to_string();
    assert!(config.validate().is_ok());

    config.synthesis.endpoint = String::new();
    assert!(config.validate().is_err());
}

/// Provider names parse case-insensitively
#[test]
fn test_provider_kind_fromStr_withVariousCases_shouldParse() {
    assert_eq!("HTTP".parse::<SynthesisProviderKind>().unwrap(), SynthesisProviderKind::Http);
    assert_eq!("mock".parse::<SynthesisProviderKind>().unwrap(), SynthesisProviderKind::Mock);
    assert!("polly".parse::<SynthesisProviderKind>().is_err());
    assert_eq!(SynthesisProviderKind::Mock.to_string(), "mock");
    assert_eq!(SynthesisProviderKind::Http.display_name(), "HTTP");
}

/// Engine settings follow the file settings
#[test]
fn test_engine_config_fromConfig_shouldSanitizeArtifactNames() {
    let temp_dir = common::create_temp_dir().unwrap();
    let config = common::mock_app_config(temp_dir.path());
    let engine_config = EngineConfig::from_config(&config);

    assert_eq!(
        engine_config.subtitle_path("My Talk (v2)"),
        temp_dir.path().join("audio").join("subtitles").join("My_Talk_v2.srt")
    );
    assert_eq!(engine_config.audio_path("???"), temp_dir.path().join("audio").join("narration.mp3"));
}
