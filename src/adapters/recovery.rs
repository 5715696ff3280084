//! Recovery middleware
//!
//! Catches a panic raised by the remaining pipeline stages, logs it with the stack of
//! the panic site and the raw request, and answers `500 Internal Server Error`.

use super::http::{HttpContext, Middleware, Next};
use crate::core::sink::panic_message;
use crate::core::{Field, Logger};
use http::StatusCode;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::io::{self, Write};
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Once};

/// Capacity of one stack buffer; longer traces are truncated.
pub const STACK_BUFFER_SIZE: usize = 64 << 10;

/// Reusable fixed-capacity buffers for stack text
#[derive(Debug)]
pub struct StackPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl StackPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take an empty buffer, allocating only when the pool is empty.
    pub fn checkout(&self) -> Vec<u8> {
        self.buffers
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.capacity))
    }

    /// Return a buffer; it is cleared and kept for the next checkout.
    pub fn give_back(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        if buffer.capacity() >= self.capacity {
            self.buffers.lock().push(buffer);
        }
    }

    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl Default for StackPool {
    fn default() -> Self {
        Self::new(STACK_BUFFER_SIZE)
    }
}

/// Writer that silently drops bytes beyond a fixed limit
struct Bounded<'a> {
    buffer: &'a mut Vec<u8>,
    limit: usize,
}

impl Write for Bounded<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit.saturating_sub(self.buffer.len());
        self.buffer.extend_from_slice(&buf[..buf.len().min(room)]);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

thread_local! {
    /// Buffers of the recovery scopes active on this thread, innermost last
    static ARMED: RefCell<Vec<(Vec<u8>, usize)>> = const { RefCell::new(Vec::new()) };
}

static HOOK: Once = Once::new();

/// Chain a panic hook that writes the panic-site backtrace into the innermost armed
/// buffer. Panics outside a recovery scope go to the previous hook.
///
/// Each panic replaces the buffer contents, so the stack logged by `Recovery` is the one
/// of the panic that reached it. A panic the handler catches on its own is still kept
/// off stderr: the hook cannot tell at that point whether anything will catch it.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let captured = ARMED.with(|armed| {
                let Ok(mut armed) = armed.try_borrow_mut() else {
                    return false;
                };
                match armed.last_mut() {
                    Some((buffer, limit)) => {
                        buffer.clear();
                        let mut out = Bounded {
                            buffer,
                            limit: *limit,
                        };
                        let _ = writeln!(out, "{}", info);
                        let _ = write!(out, "{:?}", backtrace::Backtrace::new());
                        true
                    }
                    None => false,
                }
            });
            if !captured {
                previous(info);
            }
        }));
    });
}

/// Arms a buffer for the current thread and disarms it on drop.
struct Armed;

impl Armed {
    fn arm(buffer: Vec<u8>, limit: usize) -> Self {
        ARMED.with(|armed| armed.borrow_mut().push((buffer, limit)));
        Armed
    }

    fn disarm(self) -> Vec<u8> {
        let buffer = ARMED
            .with(|armed| armed.borrow_mut().pop())
            .map(|(buffer, _)| buffer)
            .unwrap_or_default();
        std::mem::forget(self);
        buffer
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        ARMED.with(|armed| {
            armed.borrow_mut().pop();
        });
    }
}

/// Panic recovery middleware
///
/// Emits one Error record `[Recovery]` with `Error` (the panic payload), `Request`
/// (the raw request dump), `RequestURI` and `Stack`, then forces status 500. The panic
/// does not propagate past this stage.
#[derive(Debug, Clone)]
pub struct Recovery {
    logger: Arc<Logger>,
    pool: Arc<StackPool>,
}

impl Recovery {
    pub const MESSAGE: &'static str = "[Recovery]";

    pub fn new(logger: Arc<Logger>) -> Self {
        install_hook();
        Self {
            logger,
            pool: Arc::new(StackPool::default()),
        }
    }

    /// Share a pool between several recovery stages
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<StackPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn pool(&self) -> &StackPool {
        &self.pool
    }
}

impl<C: HttpContext> Middleware<C> for Recovery {
    fn handle(&self, ctx: &mut C, next: Next<'_, C>) {
        let armed = Armed::arm(self.pool.checkout(), self.pool.capacity());
        let outcome = catch_unwind(AssertUnwindSafe(|| next.run(ctx)));
        let stack = armed.disarm();

        if let Err(fault) = outcome {
            let request = ctx.dump_request();
            self.logger.error(
                Self::MESSAGE,
                [
                    Field::string("Error", panic_message(fault.as_ref())),
                    Field::string("Request", String::from_utf8_lossy(&request)),
                    Field::string("RequestURI", ctx.request_uri()),
                    Field::string("Stack", String::from_utf8_lossy(&stack)),
                ],
            );
            ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }

        self.pool.give_back(stack);
    }
}
