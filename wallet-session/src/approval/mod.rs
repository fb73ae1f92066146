//! Remote approval through a wallet-hosted surface.
//!
//! Each request opens one surface, waits for the first matching wallet
//! response, the surface closing, or the deadline, and always tears the
//! surface down before returning.

pub mod request;
pub mod response;
pub mod surface;

use std::rc::Rc;

use futures::future::{self, FutureExt};
use futures::StreamExt;
use url::Url;

use crate::config_store::ApprovalConfig;
use crate::crypto::KeyPair;
use crate::errors::{WalletError, WalletResult};

pub use request::{ApprovalRequest, SignMessageParams};
pub use response::{SignedRequest, TransactionHashes, WalletResponse, RESPONSE_TYPE};
pub use surface::{OpenedSurface, SurfaceEvent, SurfaceFeatures, SurfaceHandle, SurfaceHost};

use surface::SurfaceGuard;

#[derive(Clone)]
pub struct ApprovalChannel {
    host: Rc<dyn SurfaceHost>,
    wallet_url: Url,
    wallet_origin: String,
    config: ApprovalConfig,
}

impl ApprovalChannel {
    pub fn new(
        host: Rc<dyn SurfaceHost>,
        wallet_url: &str,
        config: ApprovalConfig,
    ) -> WalletResult<Self> {
        let wallet_url = Url::parse(wallet_url).map_err(|e| {
            WalletError::ValidationError(format!("Invalid wallet URL {}: {}", wallet_url, e))
        })?;
        let wallet_origin = wallet_url.origin().ascii_serialization();
        Ok(Self {
            host,
            wallet_url,
            wallet_origin,
            config,
        })
    }

    /// Origin inbound messages must come from.
    pub fn wallet_origin(&self) -> &str {
        &self.wallet_origin
    }

    pub fn features(&self) -> SurfaceFeatures {
        SurfaceFeatures::new(self.config.popup_width, self.config.popup_height)
    }

    /// Run one approval round trip.
    ///
    /// `decode` turns the accepted response into the caller's result. It
    /// receives the ephemeral keypair generated for sign-in requests; that key
    /// is dropped unseen on every failure path.
    pub async fn request_approval<T, F>(&self, request: ApprovalRequest, decode: F) -> WalletResult<T>
    where
        F: FnOnce(WalletResponse, Option<KeyPair>) -> WalletResult<T>,
    {
        let correlation = request.correlation_token();
        let pending_key = request.needs_ephemeral_key().then(KeyPair::generate);
        let public_key = pending_key.as_ref().map(KeyPair::public_key);
        let url = request.to_url(
            &self.wallet_url,
            &self.host.current_url(),
            &correlation,
            public_key.as_ref(),
        )?;

        log::info!("Opening wallet surface for {}", request.kind());
        let OpenedSurface { handle, mut events } = self.host.open(&url, &self.features())?;
        let guard = SurfaceGuard::new(handle);

        let outcome = self.await_response(&guard, &mut events, &correlation).await;
        drop(events);
        drop(guard);

        match outcome {
            Ok(response) => {
                log::info!("Wallet approved {}", request.kind());
                decode(response, pending_key)
            }
            Err(e) => {
                log::info!("Wallet {} ended: {}", request.kind(), e);
                Err(e)
            }
        }
    }

    async fn await_response(
        &self,
        surface: &SurfaceGuard,
        events: &mut futures::channel::mpsc::UnboundedReceiver<SurfaceEvent>,
        correlation: &str,
    ) -> WalletResult<WalletResponse> {
        let mut deadline = match self.config.timeout() {
            Some(timeout) => self.host.sleep(timeout),
            None => future::pending::<()>().boxed_local(),
        }
        .fuse();
        // Re-armed only when it fires; inbound messages never postpone a poll.
        let mut tick = self.host.sleep(self.config.poll_interval()).fuse();

        loop {
            // Messages win over close notifications and ticks that are ready together.
            futures::select_biased! {
                event = events.next() => match event {
                    Some(SurfaceEvent::Message { origin, data }) => {
                        if let Some(response) =
                            response::accept(&origin, &data, &self.wallet_origin, correlation)?
                        {
                            return Ok(response);
                        }
                    }
                    Some(SurfaceEvent::Closed) | None => return Err(WalletError::UserCancelled),
                },
                _ = tick => {
                    if surface.is_closed() {
                        return Err(WalletError::UserCancelled);
                    }
                    tick = self.host.sleep(self.config.poll_interval()).fuse();
                }
                _ = deadline => return Err(WalletError::Timeout),
            }
        }
    }
}
