// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Deferred results. A future is a single-assignment container for an
//! asynchronous result and/or error, completed at most once, with
//! synchronous-fire callbacks — not a `std::future::Future`: there is no
//! polling and no executor, matching the endpoint's cooperative,
//! non-suspending scheduling model.

use std::cell::RefCell;
use std::rc::Rc;

use crate::codec::{Decode, Encode};
use crate::error::Error;
use crate::registry::ReturnShape;

/// Unifies `()` and the four future variants so `define_interface!` can
/// generate proxy/dispatch code generically over a method's return shape
/// instead of special-casing each one.
pub trait RpcReturn: Sized + Clone {
    fn return_shape() -> ReturnShape;

    fn occupies_call_id() -> bool {
        !matches!(Self::return_shape(), ReturnShape::None)
    }

    /// The empty, not-yet-complete value inserted into the pending table
    /// (or, for `()`, returned directly) when a call is sent.
    fn pending() -> Self;

    /// Encode this (already-complete) value's response payload.
    fn write_payload(&self, buf: &mut Vec<u8>) -> Result<(), Error>;

    /// Complete `self` by decoding the remaining response payload, firing
    /// whatever callback is installed.
    fn complete_from(&self, reader: &mut &[u8]) -> Result<(), Error>;
}

impl RpcReturn for () {
    fn return_shape() -> ReturnShape {
        ReturnShape::None
    }

    fn pending() -> Self {}

    fn write_payload(&self, _buf: &mut Vec<u8>) -> Result<(), Error> {
        Ok(())
    }

    fn complete_from(&self, _reader: &mut &[u8]) -> Result<(), Error> {
        Ok(())
    }
}

/// A single-assignment callback slot: installing a callback after
/// completion fires it synchronously; a second installation silently
/// replaces the first without ever running it.
struct Slot<F>(Option<F>);

impl<F> Default for Slot<F> {
    fn default() -> Self {
        Slot(None)
    }
}

impl<F> Slot<F> {
    fn set(&mut self, f: F) {
        self.0 = Some(f);
    }

    fn take(&mut self) -> Option<F> {
        self.0.take()
    }
}

// ---------------------------------------------------------------------
// Unit-success future
// ---------------------------------------------------------------------

#[derive(Default)]
struct UnitFutureState {
    complete: bool,
    on_complete: Slot<Box<dyn FnOnce()>>,
}

/// A future with no result and no error: the wire layout for `future_unit`.
#[derive(Clone)]
pub struct UnitFuture(Rc<RefCell<UnitFutureState>>);

impl UnitFuture {
    pub fn pending() -> Self {
        UnitFuture(Rc::new(RefCell::new(UnitFutureState::default())))
    }

    /// An already-complete future, for a handler returning a pre-resolved
    /// result.
    pub fn ready() -> Self {
        let fut = Self::pending();
        fut.0.borrow_mut().complete = true;
        fut
    }

    pub fn is_complete(&self) -> bool {
        self.0.borrow().complete
    }

    /// Marks the future complete and fires `on_complete` if installed.
    pub fn complete(&self) {
        self.0.borrow_mut().complete = true;
        let callback = self.0.borrow_mut().on_complete.take();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn on_complete(&self, callback: impl FnOnce() + 'static) {
        if self.is_complete() {
            callback();
            return;
        }
        self.0.borrow_mut().on_complete.set(Box::new(callback));
    }
}

impl RpcReturn for UnitFuture {
    fn return_shape() -> ReturnShape {
        ReturnShape::FutureUnit
    }

    fn pending() -> Self {
        UnitFuture::pending()
    }

    fn write_payload(&self, _buf: &mut Vec<u8>) -> Result<(), Error> {
        Ok(())
    }

    fn complete_from(&self, _reader: &mut &[u8]) -> Result<(), Error> {
        self.complete();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Typed-success future<T>
// ---------------------------------------------------------------------

struct TypedFutureState<T> {
    complete: bool,
    result: Option<T>,
    on_complete: Slot<Box<dyn FnOnce(&T)>>,
}

impl<T> Default for TypedFutureState<T> {
    fn default() -> Self {
        TypedFutureState {
            complete: false,
            result: None,
            on_complete: Slot::default(),
        }
    }
}

/// A future carrying a typed success result: the wire layout for
/// `future_typed<T>`.
pub struct TypedFuture<T>(Rc<RefCell<TypedFutureState<T>>>);

impl<T> Clone for TypedFuture<T> {
    fn clone(&self) -> Self {
        TypedFuture(Rc::clone(&self.0))
    }
}

impl<T> TypedFuture<T> {
    pub fn pending() -> Self {
        TypedFuture(Rc::new(RefCell::new(TypedFutureState::default())))
    }

    pub fn ready(value: T) -> Self {
        let fut = Self::pending();
        {
            let mut state = fut.0.borrow_mut();
            state.complete = true;
            state.result = Some(value);
        }
        fut
    }

    pub fn is_complete(&self) -> bool {
        self.0.borrow().complete
    }

    pub fn complete(&self, value: T) {
        let callback = {
            let mut state = self.0.borrow_mut();
            state.complete = true;
            state.result = Some(value);
            state.on_complete.take()
        };
        if let Some(callback) = callback {
            let state = self.0.borrow();
            callback(state.result.as_ref().expect("just completed"));
        }
    }

    pub fn on_complete(&self, callback: impl FnOnce(&T) + 'static) {
        if self.is_complete() {
            let state = self.0.borrow();
            callback(state.result.as_ref().expect("is_complete implies Some"));
            return;
        }
        self.0.borrow_mut().on_complete.set(Box::new(callback));
    }
}

impl<T: Clone> TypedFuture<T> {
    pub fn result(&self) -> Result<T, Error> {
        self.0
            .borrow()
            .result
            .clone()
            .ok_or(Error::NotReady)
    }
}

impl<T: Encode + Decode> RpcReturn for TypedFuture<T> {
    fn return_shape() -> ReturnShape {
        ReturnShape::FutureTyped
    }

    fn pending() -> Self {
        TypedFuture::pending()
    }

    fn write_payload(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let state = self.0.borrow();
        let value = state.result.as_ref();
        encode_optional_ref(value, buf)
    }

    fn complete_from(&self, reader: &mut &[u8]) -> Result<(), Error> {
        let value: Option<T> = Option::decode(reader)?;
        let value = value.ok_or_else(|| {
            Error::SchemaViolation("future_typed response carried no value".into())
        })?;
        self.complete(value);
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Error future (unit)
// ---------------------------------------------------------------------

#[derive(Default)]
struct ErrorFutureState {
    complete: bool,
    error: Option<String>,
    on_result: Slot<Box<dyn FnOnce(Result<(), &str>)>>,
    on_success: Slot<Box<dyn FnOnce()>>,
    on_error: Slot<Box<dyn FnOnce(&str)>>,
}

/// A future carrying either success (no value) or an error message: the
/// wire layout for `future_err_unit`.
#[derive(Clone)]
pub struct ErrorFuture(Rc<RefCell<ErrorFutureState>>);

impl ErrorFuture {
    pub fn pending() -> Self {
        ErrorFuture(Rc::new(RefCell::new(ErrorFutureState::default())))
    }

    pub fn ok() -> Self {
        let fut = Self::pending();
        fut.0.borrow_mut().complete = true;
        fut
    }

    pub fn err(message: impl Into<String>) -> Self {
        let fut = Self::pending();
        {
            let mut state = fut.0.borrow_mut();
            state.complete = true;
            state.error = Some(message.into());
        }
        fut
    }

    pub fn is_complete(&self) -> bool {
        self.0.borrow().complete
    }

    pub fn is_error(&self) -> bool {
        self.0.borrow().error.is_some()
    }

    fn complete_with(&self, error: Option<String>) {
        let (on_result, on_success, on_error) = {
            let mut state = self.0.borrow_mut();
            state.complete = true;
            state.error = error;
            (
                state.on_result.take(),
                state.on_success.take(),
                state.on_error.take(),
            )
        };
        let error = self.0.borrow().error.clone();
        if let Some(callback) = on_result {
            callback(match &error {
                Some(e) => Err(e.as_str()),
                None => Ok(()),
            });
        }
        match &error {
            None => {
                if let Some(callback) = on_success {
                    callback();
                }
            }
            Some(message) => {
                if let Some(callback) = on_error {
                    callback(message);
                }
            }
        }
    }

    pub fn on_result(&self, callback: impl FnOnce(Result<(), &str>) + 'static) {
        if self.is_complete() {
            let state = self.0.borrow();
            callback(match &state.error {
                Some(e) => Err(e.as_str()),
                None => Ok(()),
            });
            return;
        }
        self.0.borrow_mut().on_result.set(Box::new(callback));
    }

    pub fn on_success(&self, callback: impl FnOnce() + 'static) {
        if self.is_complete() {
            if !self.is_error() {
                callback();
            }
            return;
        }
        self.0.borrow_mut().on_success.set(Box::new(callback));
    }

    pub fn on_error(&self, callback: impl FnOnce(&str) + 'static) {
        if self.is_complete() {
            let state = self.0.borrow();
            if let Some(message) = &state.error {
                callback(message);
            }
            return;
        }
        self.0.borrow_mut().on_error.set(Box::new(callback));
    }
}

impl RpcReturn for ErrorFuture {
    fn return_shape() -> ReturnShape {
        ReturnShape::FutureErrUnit
    }

    fn pending() -> Self {
        ErrorFuture::pending()
    }

    fn write_payload(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        self.0.borrow().error.clone().encode(buf)
    }

    fn complete_from(&self, reader: &mut &[u8]) -> Result<(), Error> {
        let error: Option<String> = Option::decode(reader)?;
        self.complete_with(error);
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Error future (typed)<T>
// ---------------------------------------------------------------------

struct ErrorFutureTypedState<T> {
    complete: bool,
    result: Option<T>,
    error: Option<String>,
    on_result: Slot<Box<dyn FnOnce(Result<&T, &str>)>>,
    on_success: Slot<Box<dyn FnOnce(&T)>>,
    on_error: Slot<Box<dyn FnOnce(&str)>>,
}

impl<T> Default for ErrorFutureTypedState<T> {
    fn default() -> Self {
        ErrorFutureTypedState {
            complete: false,
            result: None,
            error: None,
            on_result: Slot::default(),
            on_success: Slot::default(),
            on_error: Slot::default(),
        }
    }
}

/// A future carrying either a typed result or an error message: the wire
/// layout for `future_err_typed<T>`.
pub struct ErrorFutureTyped<T>(Rc<RefCell<ErrorFutureTypedState<T>>>);

impl<T> Clone for ErrorFutureTyped<T> {
    fn clone(&self) -> Self {
        ErrorFutureTyped(Rc::clone(&self.0))
    }
}

impl<T> ErrorFutureTyped<T> {
    pub fn pending() -> Self {
        ErrorFutureTyped(Rc::new(RefCell::new(ErrorFutureTypedState::default())))
    }

    pub fn ready(value: T) -> Self {
        let fut = Self::pending();
        {
            let mut state = fut.0.borrow_mut();
            state.complete = true;
            state.result = Some(value);
        }
        fut
    }

    pub fn err(message: impl Into<String>) -> Self {
        let fut = Self::pending();
        {
            let mut state = fut.0.borrow_mut();
            state.complete = true;
            state.error = Some(message.into());
        }
        fut
    }

    pub fn is_complete(&self) -> bool {
        self.0.borrow().complete
    }

    pub fn is_error(&self) -> bool {
        self.0.borrow().error.is_some()
    }

    fn complete_with(&self, error: Option<String>, result: Option<T>) {
        {
            let mut state = self.0.borrow_mut();
            state.complete = true;
            state.error = error;
            state.result = result;
        }
        let on_result = self.0.borrow_mut().on_result.take();
        let on_success = self.0.borrow_mut().on_success.take();
        let on_error = self.0.borrow_mut().on_error.take();

        let state = self.0.borrow();
        if let Some(callback) = on_result {
            match &state.error {
                Some(e) => callback(Err(e.as_str())),
                None => callback(Ok(state.result.as_ref().expect("success implies result"))),
            }
        }
        match &state.error {
            None => {
                if let Some(callback) = on_success {
                    callback(state.result.as_ref().expect("success implies result"));
                }
            }
            Some(message) => {
                if let Some(callback) = on_error {
                    callback(message);
                }
            }
        }
    }

    pub fn on_result(&self, callback: impl FnOnce(Result<&T, &str>) + 'static) {
        if self.is_complete() {
            let state = self.0.borrow();
            match &state.error {
                Some(e) => callback(Err(e.as_str())),
                None => callback(Ok(state.result.as_ref().expect("success implies result"))),
            }
            return;
        }
        self.0.borrow_mut().on_result.set(Box::new(callback));
    }

    pub fn on_success(&self, callback: impl FnOnce(&T) + 'static) {
        if self.is_complete() {
            let state = self.0.borrow();
            if let Some(result) = &state.result {
                if state.error.is_none() {
                    callback(result);
                }
            }
            return;
        }
        self.0.borrow_mut().on_success.set(Box::new(callback));
    }

    pub fn on_error(&self, callback: impl FnOnce(&str) + 'static) {
        if self.is_complete() {
            let state = self.0.borrow();
            if let Some(message) = &state.error {
                callback(message);
            }
            return;
        }
        self.0.borrow_mut().on_error.set(Box::new(callback));
    }
}

impl<T: Clone> ErrorFutureTyped<T> {
    pub fn result(&self) -> Result<T, Error> {
        let state = self.0.borrow();
        if !state.complete {
            return Err(Error::NotReady);
        }
        match (&state.result, &state.error) {
            (Some(value), None) => Ok(value.clone()),
            (_, Some(message)) => Err(Error::HandlerException(message.clone())),
            (None, None) => Err(Error::NotReady),
        }
    }
}

impl<T: Encode + Decode> RpcReturn for ErrorFutureTyped<T> {
    fn return_shape() -> ReturnShape {
        ReturnShape::FutureErrTyped
    }

    fn pending() -> Self {
        ErrorFutureTyped::pending()
    }

    fn write_payload(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let state = self.0.borrow();
        state.error.clone().encode(buf)?;
        if state.error.is_none() {
            encode_optional_ref(state.result.as_ref(), buf)?;
        }
        Ok(())
    }

    fn complete_from(&self, reader: &mut &[u8]) -> Result<(), Error> {
        let error: Option<String> = Option::decode(reader)?;
        if let Some(message) = error {
            self.complete_with(Some(message), None);
            return Ok(());
        }
        let value: Option<T> = Option::decode(reader)?;
        let value = value.ok_or_else(|| {
            Error::SchemaViolation("future_err_typed success response carried no value".into())
        })?;
        self.complete_with(None, Some(value));
        Ok(())
    }
}

/// Encodes a borrowed optional value using the same presence-tag framing
/// as `Option<T>`, without requiring ownership of `T`.
fn encode_optional_ref<T: Encode>(value: Option<&T>, buf: &mut Vec<u8>) -> Result<(), Error> {
    match value {
        None => buf.push(0),
        Some(v) => {
            buf.push(1);
            v.encode(buf)?;
        }
    }
    Ok(())
}
