//! Request deduplication: at most one in-flight invocation of the wrapped
//! closure per key at any moment, implemented with a `Mutex` + `Condvar`
//! per in-flight call rather than a reentrant wait-group primitive.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::Result;

struct Call<T: Clone> {
    done: Mutex<bool>,
    condvar: Condvar,
    // Error is stringified because crate::error::Error isn't Clone and every
    // waiter needs its own copy of whatever the single invocation produced.
    result: Mutex<Option<std::result::Result<T, String>>>,
}

/// Deduplicates concurrent calls sharing the same key. Does not cache
/// results across calls — a finished call's descriptor is removed
/// immediately, so a subsequent call with the same key always re-invokes
/// the closure.
pub struct Flight<T: Clone> {
    calls: Mutex<HashMap<String, Arc<Call<T>>>>,
}

impl<T: Clone> Flight<T> {
    pub fn new() -> Flight<T> {
        Flight {
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn do_call<F>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut calls = self.calls.lock().expect("flight lock poisoned");
        if let Some(call) = calls.get(key).cloned() {
            drop(calls);
            return Flight::wait(&call);
        }

        let call = Arc::new(Call {
            done: Mutex::new(false),
            condvar: Condvar::new(),
            result: Mutex::new(None),
        });
        calls.insert(key.to_string(), call.clone());
        drop(calls);

        let outcome = f();
        *call.result.lock().expect("flight lock poisoned") =
            Some(outcome.as_ref().map(|v| v.clone()).map_err(|e| e.to_string()));
        *call.done.lock().expect("flight lock poisoned") = true;
        call.condvar.notify_all();

        self.calls
            .lock()
            .expect("flight lock poisoned")
            .remove(key);

        outcome
    }

    fn wait(call: &Arc<Call<T>>) -> Result<T> {
        let mut done = call.done.lock().expect("flight lock poisoned");
        while !*done {
            done = call.condvar.wait(done).expect("flight lock poisoned");
        }
        let result = call.result.lock().expect("flight lock poisoned");
        match result.as_ref().expect("result set before done flag") {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(crate::error::Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                message.clone(),
            ))),
        }
    }
}

impl<T: Clone> Default for Flight<T> {
    fn default() -> Flight<T> {
        Flight::new()
    }
}
