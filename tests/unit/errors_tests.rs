/*!
 * Tests for error types and their classification
 */

use std::error::Error;

use narrasync::errors::{AppError, ProviderError, SyncError};
use narrasync::providers::JobKind;

/// Test which provider errors count as transient while polling
#[test]
fn test_provider_error_isTransient_shouldClassifyByCause() {
    assert!(ProviderError::ConnectionError("reset".to_string()).is_transient());
    assert!(ProviderError::RequestFailed("eof".to_string()).is_transient());
    assert!(ProviderError::RateLimitExceeded("slow down".to_string()).is_transient());
    assert!(ProviderError::ApiError { status_code: 503, message: String::new() }.is_transient());

    assert!(!ProviderError::ApiError { status_code: 404, message: String::new() }.is_transient());
    assert!(!ProviderError::AuthenticationError("denied".to_string()).is_transient());
    assert!(!ProviderError::ParseError("garbage".to_string()).is_transient());
}

/// Test which attempt failures a caller may retry with a fresh attempt
#[test]
fn test_sync_error_isRetryable_shouldSeparateProviderAndLocalFailures() {
    assert!(SyncError::SynthesisFailed { kind: JobKind::Audio, reason: "boom".to_string() }.is_retryable());
    assert!(SyncError::MissingBoundary { marker: "segment_3".to_string() }.is_retryable());
    assert!(SyncError::SynthesisUnavailable {
        kind: JobKind::Marks,
        attempts: 4,
        last_error: "503".to_string()
    }
    .is_retryable());

    assert!(!SyncError::EmptyInput.is_retryable());
    assert!(!SyncError::Cancelled("stop".to_string()).is_retryable());
    assert!(!SyncError::MissingScriptText { path: "a.json".to_string() }.is_retryable());
}

/// Test error messages name the job and keep the provider cause
#[test]
fn test_sync_error_display_shouldCarryContext() {
    let error = SyncError::SubmitRejected {
        kind: JobKind::Marks,
        source: ProviderError::ApiError { status_code: 400, message: "bad ssml".to_string() },
    };
    assert_eq!(
        error.to_string(),
        "Provider rejected the marks job: API responded with error: 400 - bad ssml"
    );
    assert!(error.source().is_some());

    let error = SyncError::MissingBoundary { marker: "segment_2".to_string() };
    assert!(error.to_string().contains("segment_2"));
}

/// Test conversions into the application error
#[test]
fn test_app_error_from_withVariousSources_shouldWrap() {
    let app: AppError = SyncError::EmptyInput.into();
    assert!(matches!(app, AppError::Sync(SyncError::EmptyInput)));

    let app: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(app, AppError::File(_)));

    let app: AppError = anyhow::anyhow!("odd").into();
    assert_eq!(app.to_string(), "Unknown error: odd");

    let sync: SyncError = ProviderError::ParseError("x".to_string()).into();
    assert!(matches!(sync, SyncError::Provider(_)));
}
