//! Public API surface and foreign entry points.
//!
//! Wraps a single process-wide [`PlaybackEngine`] behind free functions so
//! host applications (and the C/JNI shims below) do not manage engine
//! handles themselves. The embedding contract is fire-and-forget: the
//! foreign exports never unwind across the FFI boundary, they log failures
//! and return.

use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;

use crate::config::EngineConfig;
use crate::engine::backend::default_backend;
use crate::engine::{PlaybackEngine, SessionState};
use crate::error::{log_audio_error, AudioError};

static SESSION: Lazy<Mutex<Option<PlaybackEngine>>> = Lazy::new(|| Mutex::new(None));

fn lock_session() -> Result<MutexGuard<'static, Option<PlaybackEngine>>, AudioError> {
    SESSION.lock().map_err(|_| AudioError::LockPoisoned {
        component: "global_session".to_string(),
    })
}

/// Start tone playback on the platform's default output device.
///
/// Creates the process-wide engine on first use (or after [`shutdown`]);
/// `config` only takes effect at creation time. Calling while already
/// playing returns `AlreadyRunning`.
pub fn start_tone_with(config: EngineConfig) -> Result<(), AudioError> {
    let mut session = lock_session()?;
    let needs_engine = match session.as_ref() {
        None => true,
        Some(engine) => engine.state() == SessionState::Closed,
    };
    if needs_engine {
        *session = Some(PlaybackEngine::new(config, default_backend()));
    }
    match session.as_ref() {
        Some(engine) => engine.start(),
        None => Err(AudioError::SessionClosed),
    }
}

/// Start the default 440 Hz tone.
pub fn start_tone() -> Result<(), AudioError> {
    start_tone_with(EngineConfig::default())
}

/// Stop playback; the engine stays available for another [`start_tone`].
pub fn stop_tone() -> Result<(), AudioError> {
    let session = lock_session()?;
    match session.as_ref() {
        Some(engine) => engine.stop(),
        None => Err(AudioError::NotRunning),
    }
}

/// Tear down the process-wide engine. Idempotent.
pub fn shutdown() -> Result<(), AudioError> {
    let engine = lock_session()?.take();
    match engine {
        Some(engine) => engine.close(),
        None => Ok(()),
    }
}

// ============================================================================
// C ABI
// ============================================================================

/// C entry point: start the default tone.
#[no_mangle]
pub extern "C" fn tinyaudio_start_sound() {
    crate::init_logging();
    if let Err(err) = start_tone() {
        log_audio_error(&err, "tinyaudio_start_sound");
    }
}

/// C entry point: stop playback.
#[no_mangle]
pub extern "C" fn tinyaudio_stop_sound() {
    if let Err(err) = stop_tone() {
        log_audio_error(&err, "tinyaudio_stop_sound");
    }
}

/// C entry point: release the engine and the output device.
#[no_mangle]
pub extern "C" fn tinyaudio_shutdown() {
    if let Err(err) = shutdown() {
        log_audio_error(&err, "tinyaudio_shutdown");
    }
}

// ============================================================================
// JNI (Android)
// ============================================================================

#[cfg(target_os = "android")]
mod jni_exports {
    use jni::objects::{GlobalRef, JObject};
    use jni::JNIEnv;
    use once_cell::sync::OnceCell;

    use crate::error::{log_audio_error, AudioError};

    // Keeps the activity reference alive for the lifetime of the process so
    // the pointer handed to ndk-context stays valid
    static ACTIVITY: OnceCell<GlobalRef> = OnceCell::new();

    fn init_android_context(env: &mut JNIEnv, activity: &JObject) -> Result<(), AudioError> {
        ACTIVITY
            .get_or_try_init(|| {
                let global = env.new_global_ref(activity).map_err(|e| {
                    AudioError::DeviceUnavailable {
                        reason: format!("failed to pin activity reference: {}", e),
                    }
                })?;
                let vm = env.get_java_vm().map_err(|e| AudioError::DeviceUnavailable {
                    reason: format!("failed to obtain JavaVM: {}", e),
                })?;
                unsafe {
                    ndk_context::initialize_android_context(
                        vm.get_java_vm_pointer() as *mut _,
                        global.as_obj().as_raw() as *mut _,
                    );
                }
                Ok(global)
            })
            .map(|_| ())
    }

    /// `MainActivity.startSound()` - begin tone playback.
    #[no_mangle]
    pub extern "system" fn Java_com_github_mendsley_tinyaudio_MainActivity_startSound(
        mut env: JNIEnv,
        activity: JObject,
    ) {
        crate::init_logging();
        if let Err(err) = init_android_context(&mut env, &activity) {
            log_audio_error(&err, "jni_start_sound");
            return;
        }
        if let Err(err) = super::start_tone() {
            log_audio_error(&err, "jni_start_sound");
        }
    }

    /// `MainActivity.stopSound()` - halt tone playback.
    #[no_mangle]
    pub extern "system" fn Java_com_github_mendsley_tinyaudio_MainActivity_stopSound(
        _env: JNIEnv,
        _activity: JObject,
    ) {
        if let Err(err) = super::stop_tone() {
            log_audio_error(&err, "jni_stop_sound");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These share the process-wide session; they only exercise paths that
    // never create an engine, so parallel execution is safe.

    #[test]
    fn test_stop_without_session_reports_not_running() {
        assert_eq!(stop_tone(), Err(AudioError::NotRunning));
    }

    #[test]
    fn test_shutdown_without_session_is_ok() {
        assert!(shutdown().is_ok());
        assert!(shutdown().is_ok());
    }
}
