// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Auth token manager — device registration and lazy user-token renewal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use legible_core::error::{LegibleError, Result};
use tracing::{Span, debug, info, info_span, instrument, warn};

use crate::claims::{self, TokenKind, mask_token};
use crate::credentials::{CredentialStore, Credentials};
use crate::monitor::TokenMonitor;

/// Length of the one-time registration code.
pub const REGISTRATION_CODE_LEN: usize = 8;

/// Remote token endpoints. The HTTP transport lives outside this crate.
pub trait TokenExchanger: Send + Sync {
    /// Exchange a one-time code for a long-lived device token.
    fn register_device(&self, code: &str) -> Result<String>;

    /// Derive a fresh user token from the device token.
    fn renew_user_token(&self, device_token: &str) -> Result<String>;
}

/// Owns the two-token credential and keeps the user token fresh.
pub struct AuthTokenManager {
    store: CredentialStore,
    exchanger: Arc<dyn TokenExchanger>,
    monitor: Option<Arc<TokenMonitor>>,
    creds: Mutex<Credentials>,
    span: Span,
}

impl AuthTokenManager {
    pub fn new(store: CredentialStore, exchanger: Arc<dyn TokenExchanger>) -> Self {
        let span = info_span!("auth", token_file = %store.path().display());
        Self {
            store,
            exchanger,
            monitor: None,
            creds: Mutex::new(Credentials::default()),
            span,
        }
    }

    /// Feed every user-token renewal into `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<TokenMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Credentials> {
        self.creds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once a device token is held in memory.
    pub fn is_authenticated(&self) -> bool {
        self.lock().has_device_token()
    }

    /// Snapshot of the in-memory credential.
    pub fn credentials(&self) -> Credentials {
        self.lock().clone()
    }

    /// Persist a new device token. Any previous user token is discarded.
    pub fn set_token(&self, device_token: &str) -> Result<()> {
        let _enter = self.span.enter();
        if device_token.trim().is_empty() {
            return Err(LegibleError::Auth("device token is empty".into()));
        }
        let creds = Credentials {
            device_token: device_token.trim().to_owned(),
            user_token: String::new(),
        };
        self.store.save(&creds)?;
        info!(device_token = %mask_token(&creds.device_token), "device token saved");
        *self.lock() = creds;
        Ok(())
    }

    /// Load the credential file into memory. Fails when it holds no device token.
    pub fn load_token(&self) -> Result<()> {
        let _enter = self.span.enter();
        let creds = self.store.load()?;
        if !creds.has_device_token() {
            return Err(LegibleError::NotAuthenticated);
        }
        debug!(
            device_token = %mask_token(&creds.device_token),
            has_user_token = !creds.user_token.is_empty(),
            "credentials loaded"
        );
        *self.lock() = creds;
        Ok(())
    }

    /// Load the device token and make sure a usable user token is held.
    #[instrument(skip_all, parent = &self.span)]
    pub fn authenticate(&self) -> Result<()> {
        self.load_token()?;
        self.ensure_valid_token().map(|_| ())
    }

    /// Register this device with a one-time code, then derive a user token.
    #[instrument(skip_all, parent = &self.span)]
    pub fn register_device(&self, code: &str) -> Result<()> {
        let code = code.trim();
        if code.chars().count() != REGISTRATION_CODE_LEN {
            return Err(LegibleError::Auth(format!(
                "invalid code length: expected {REGISTRATION_CODE_LEN} characters, got {}",
                code.chars().count()
            )));
        }
        info!("registering device");
        let device_token = self
            .exchanger
            .register_device(code)
            .map_err(|e| LegibleError::Auth(format!("device registration failed: {e}")))?;
        self.set_token(&device_token)?;
        self.ensure_valid_token().map(|_| ())
    }

    /// Return a user token that is good for at least the expiry buffer,
    /// renewing it first when needed. Called before every privileged request.
    pub fn ensure_valid_token(&self) -> Result<String> {
        let _enter = self.span.enter();
        if !self.is_authenticated() {
            self.load_token()?;
        }

        let current = self.credentials();
        if !current.user_token.is_empty() && !claims::is_expired(&current.user_token, TokenKind::User) {
            return Ok(current.user_token);
        }

        info!(
            expiration = ?claims::expiration(&current.user_token),
            "user token missing or expiring, renewing"
        );
        let user_token = self
            .exchanger
            .renew_user_token(&current.device_token)
            .map_err(|e| LegibleError::Auth(format!("failed to renew user token: {e}")))?;

        let renewed = Credentials {
            device_token: current.device_token,
            user_token: user_token.clone(),
        };
        if let Err(e) = self.store.save(&renewed) {
            warn!(error = %e, "failed to persist renewed user token");
        }
        *self.lock() = renewed;

        let expires = claims::expiration(&user_token);
        if let Some(monitor) = &self.monitor {
            let valid_for = expires.map(|exp| exp - chrono::Utc::now());
            monitor.record_renewal(TokenKind::User, valid_for);
        }
        info!(
            user_token = %mask_token(&user_token),
            expiration = ?expires,
            "user token renewed"
        );
        Ok(user_token)
    }
}
