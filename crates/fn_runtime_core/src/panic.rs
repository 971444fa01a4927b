//! Panic boundary around handler dispatch.
//!
//! A panicking handler must fail its invocation, not the process. The hook
//! installed here records the backtrace of panics raised inside
//! [`catch_handler_panic`] so they can be reported like any other error;
//! panics anywhere else still reach the previously installed hook.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use crate::fault::{frames_from_backtrace, HandlerError, StackFrame};

pub const PANIC_ERROR_TYPE: &str = "Panic";

static INSTALL_HOOK: Once = Once::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static CAPTURED_FRAMES: RefCell<Option<Vec<StackFrame>>> = const { RefCell::new(None) };
}

/// Install the capturing panic hook. Idempotent.
pub fn install_panic_capture() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let frames = frames_from_backtrace(&Backtrace::force_capture());
                CAPTURED_FRAMES.with(|slot| *slot.borrow_mut() = Some(frames));
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `f`, converting a panic into a [`HandlerError`] of type `Panic`.
pub fn catch_handler_panic<T>(f: impl FnOnce() -> T) -> Result<T, HandlerError> {
    install_panic_capture();

    let was_capturing = CAPTURING.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|flag| flag.set(was_capturing));

    result.map_err(|payload| {
        let frames = CAPTURED_FRAMES
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_default();
        HandlerError::from_parts(PANIC_ERROR_TYPE, panic_message(payload.as_ref()), frames)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_when_nothing_panics() {
        let value = catch_handler_panic(|| 7).expect("closure should not panic");
        assert_eq!(value, 7);
    }

    #[test]
    fn converts_formatted_panic_into_handler_error() {
        let error = catch_handler_panic(|| -> u8 { panic!("bad input: {}", 3) })
            .expect_err("closure should panic");
        assert_eq!(error.error_type(), PANIC_ERROR_TYPE);
        assert_eq!(error.message(), "bad input: 3");
    }

    #[test]
    fn converts_static_str_and_opaque_payloads() {
        let error = catch_handler_panic(|| -> u8 { panic!("static message") })
            .expect_err("closure should panic");
        assert_eq!(error.message(), "static message");

        let error = catch_handler_panic(|| -> u8 { std::panic::panic_any(42_u32) })
            .expect_err("closure should panic");
        assert_eq!(error.message(), "handler panicked with a non-string payload");
    }

    #[test]
    fn capture_flag_is_restored_after_panic() {
        let _ = catch_handler_panic(|| -> u8 { panic!("first") });
        assert!(!CAPTURING.with(Cell::get));
    }
}
