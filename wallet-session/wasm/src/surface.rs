//! Browser approval surface: `window.open` popups and `message` events.
//!
//! Cross-origin popups give no reliable close notification, so closing is
//! only detected through the core's polling of [`SurfaceHandle::is_closed`].

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedSender};
use futures::future::LocalBoxFuture;
use js_sys::{Function, Promise};
use url::Url;
use wallet_session_lib::{
    OpenedSurface, SurfaceEvent, SurfaceFeatures, SurfaceHandle, SurfaceHost, WalletError,
    WalletResult,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{MessageEvent, Window};

use crate::error::js_to_json;

type MessageListener = Closure<dyn FnMut(MessageEvent)>;

pub struct BrowserSurfaceHost {
    window: Window,
}

impl BrowserSurfaceHost {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    pub fn from_window() -> WalletResult<Self> {
        web_sys::window()
            .map(Self::new)
            .ok_or_else(|| WalletError::Unknown("No window available".to_string()))
    }
}

impl SurfaceHost for BrowserSurfaceHost {
    fn current_url(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn open(&self, url: &Url, features: &SurfaceFeatures) -> WalletResult<OpenedSurface> {
        let popup = self
            .window
            .open_with_url_and_target_and_features(
                url.as_str(),
                "_blank",
                &features.to_window_features(),
            )
            .ok()
            .flatten()
            .ok_or(WalletError::PopupBlocked)?;

        let (sender, events) = mpsc::unbounded();
        let listener = message_listener(sender);
        self.window
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            .map_err(|_| {
                let _ = popup.close();
                WalletError::Unknown("Failed to attach message listener".to_string())
            })?;

        Ok(OpenedSurface {
            handle: Box::new(BrowserSurface {
                window: self.window.clone(),
                popup,
                listener: RefCell::new(Some(listener)),
            }),
            events,
        })
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(Timer::new(&self.window, duration))
    }
}

fn message_listener(sender: UnboundedSender<SurfaceEvent>) -> MessageListener {
    Closure::wrap(Box::new(move |event: MessageEvent| {
        let Some(data) = js_to_json(&event.data()) else {
            log::debug!("Dropping non-JSON message from {}", event.origin());
            return;
        };
        let _ = sender.unbounded_send(SurfaceEvent::Message {
            origin: event.origin(),
            data,
        });
    }) as Box<dyn FnMut(MessageEvent)>)
}

struct BrowserSurface {
    window: Window,
    popup: Window,
    listener: RefCell<Option<MessageListener>>,
}

impl SurfaceHandle for BrowserSurface {
    fn is_closed(&self) -> bool {
        self.popup.closed().unwrap_or(true)
    }

    fn close(&self) {
        let _ = self.popup.close();
    }

    fn detach(&self) {
        if let Some(listener) = self.listener.borrow_mut().take() {
            let _ = self
                .window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
        }
    }
}

impl Drop for BrowserSurface {
    fn drop(&mut self) {
        self.detach();
    }
}

/// `setTimeout` as a future; dropping it clears the timer.
struct Timer {
    window: Window,
    handle: Cell<Option<i32>>,
    future: JsFuture,
}

impl Timer {
    fn new(window: &Window, duration: Duration) -> Self {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let mut handle = None;
        let promise = Promise::new(&mut |resolve: Function, _reject: Function| {
            match window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis) {
                Ok(id) => handle = Some(id),
                Err(_) => {
                    let _ = resolve.call0(&JsValue::NULL);
                }
            }
        });
        Self {
            window: window.clone(),
            handle: Cell::new(handle),
            future: JsFuture::from(promise),
        }
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.future).poll(cx) {
            Poll::Ready(_) => {
                self.handle.set(None);
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}
