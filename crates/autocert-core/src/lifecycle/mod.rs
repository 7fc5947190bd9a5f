//! Certificate lifecycle state machine
//!
//! The [`CertificateLifecycle`] is responsible for:
//! - Loading existing certificates from every repository at startup
//! - Deciding whether acquisition is needed
//! - Looping on the renewal check schedule
//! - Fanning newly issued certificates out to every repository
//!
//! ## Architecture
//!
//! ```text
//!  Startup ──► CheckRenewal ◄──────────┐
//!     │             │                  │
//!     │             ▼ (due/missing)    │
//!     └──────► BeginCreation ──────────┘
//!                   │
//!                   ▼ (renewal unconfigured, shutdown)
//!               Terminal
//! ```
//!
//! Each transition is a function from (state, context) to the next state;
//! collaborator calls are the only side effects, which keeps every
//! transition drivable from a test without a hosting runtime.
//!
//! ## Concurrency
//!
//! Exactly one task drives the machine; states never run concurrently with
//! each other. Within `BeginCreation` the per-repository saves fan out and
//! are awaited jointly before the state completes. Shutdown is observed
//! between and inside states via `tokio::select!`, so a renewal sleep never
//! delays it.
//!
//! ## Failure policy
//!
//! Acquisition and enumeration failures are fatal to the cycle and
//! propagate out of [`CertificateLifecycle::run`]; silent renewal failure
//! is considered worse than a visibly stopped background task. Persistence
//! failures are collected per repository and surfaced as one aggregate
//! error after every repository has received its save attempt.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::cert::CertificateRecord;
use crate::config::{AutocertConfig, RenewalConfig};
use crate::domains::DomainEnumerator;
use crate::error::{Error, RepositoryFailure, Result};
use crate::store::CertificateStore;
use crate::traits::{CertificateAcquirer, CertificateRepository};

/// States of the certificate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Load persisted certificates and decide whether acquisition is needed
    Startup,
    /// Scan certificates on the renewal schedule
    CheckRenewal,
    /// Acquire and persist certificates for the current domain requests
    BeginCreation,
    /// Absorbing; no further work
    Terminal,
}

impl LifecycleState {
    /// True for the absorbing terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

/// Events emitted by the lifecycle for external monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Lifecycle task started
    Started {
        /// Number of configured repositories
        repositories: usize,
    },

    /// Persisted certificates were loaded into the runtime store
    CertificatesLoaded {
        /// Certificates read from all repositories
        count: usize,
    },

    /// The machine moved to a new state
    StateChanged {
        /// State being left
        from: LifecycleState,
        /// State being entered
        to: LifecycleState,
    },

    /// A domain's certificate is missing or inside the renewal window
    RenewalDue {
        /// The triggering domain
        domain: String,
    },

    /// A certificate request was skipped because it is still satisfied
    CreationSkipped {
        /// Primary domain of the skipped request
        primary: String,
    },

    /// A certificate was freshly issued
    CertificateAcquired {
        /// Leaf subject
        subject: String,
        /// Leaf thumbprint
        thumbprint: String,
        /// Leaf expiry
        not_after: DateTime<Utc>,
    },

    /// A repository failed to persist a certificate
    PersistenceFailed {
        /// Repository name
        repository: String,
        /// Rendered failure
        error: String,
    },

    /// Lifecycle stopped
    Stopped {
        /// Why it stopped
        reason: String,
    },
}

/// Drives certificate acquisition and renewal against a shared store
///
/// ## Lifecycle
///
/// 1. Create with [`CertificateLifecycle::new`]
/// 2. Start with [`CertificateLifecycle::run`] on one task
/// 3. The task runs until renewal is unconfigured, a fatal error occurs,
///    or a shutdown signal is received
pub struct CertificateLifecycle {
    /// Runtime store shared with the TLS handshake path
    store: Arc<CertificateStore>,

    /// Aggregated domain requests
    enumerator: Arc<DomainEnumerator>,

    /// Issues new certificates
    acquirer: Arc<dyn CertificateAcquirer>,

    /// Durable storage fan-out targets
    repositories: Vec<Arc<dyn CertificateRepository>>,

    /// Renewal scheduling
    renewal: RenewalConfig,

    /// Minimum settling delay for a persistence fan-out
    settle_floor: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<LifecycleEvent>,
}

impl CertificateLifecycle {
    /// Create a new lifecycle driver
    ///
    /// # Returns
    ///
    /// A tuple of (lifecycle, event_receiver) where event_receiver yields
    /// lifecycle events
    pub fn new(
        store: Arc<CertificateStore>,
        enumerator: Arc<DomainEnumerator>,
        acquirer: Arc<dyn CertificateAcquirer>,
        repositories: Vec<Arc<dyn CertificateRepository>>,
        config: &AutocertConfig,
    ) -> Result<(Self, mpsc::Receiver<LifecycleEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let lifecycle = Self {
            store,
            enumerator,
            acquirer,
            repositories,
            renewal: config.renewal.clone(),
            settle_floor: config.engine.save_settle_floor(),
            event_tx: tx,
        };

        Ok((lifecycle, rx))
    }

    /// Run the lifecycle until Terminal, a fatal error, or SIGINT
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the lifecycle with a controlled shutdown signal
    ///
    /// Passing `None` behaves like [`CertificateLifecycle::run`]. The
    /// signal is observed between states and inside any in-flight sleep or
    /// collaborator wait, so shutdown never waits out a renewal period.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit(LifecycleEvent::Started {
            repositories: self.repositories.len(),
        });

        let mut state = LifecycleState::Startup;

        if let Some(mut rx) = shutdown_rx {
            while !state.is_terminal() {
                let next = tokio::select! {
                    next = self.step(state) => next,

                    _ = &mut rx => {
                        info!("shutdown signal received");
                        self.emit(LifecycleEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        Ok(LifecycleState::Terminal)
                    }
                };
                state = self.unwind_on_error(next)?;
            }
        } else {
            while !state.is_terminal() {
                let next = tokio::select! {
                    next = self.step(state) => next,

                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        self.emit(LifecycleEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        Ok(LifecycleState::Terminal)
                    }
                };
                state = self.unwind_on_error(next)?;
            }
        }

        Ok(())
    }

    /// Evaluate one state and return the next
    ///
    /// Public so transitions can be driven individually; `run` is a loop
    /// over this function plus shutdown observation.
    pub async fn step(&self, state: LifecycleState) -> Result<LifecycleState> {
        let next = match state {
            LifecycleState::Startup => self.startup().await?,
            LifecycleState::CheckRenewal => self.check_renewal().await?,
            LifecycleState::BeginCreation => self.begin_creation().await?,
            LifecycleState::Terminal => LifecycleState::Terminal,
        };

        if next != state {
            debug!(from = ?state, to = ?next, "lifecycle transition");
            self.emit(LifecycleEvent::StateChanged { from: state, to: next });
        }

        Ok(next)
    }

    /// Startup: load persisted certificates, then decide the first move
    async fn startup(&self) -> Result<LifecycleState> {
        debug!("loading existing certificates");
        self.load_existing().await?;

        let requests = self.enumerator.domains(false).await?;
        let covered = requests
            .iter()
            .all(|request| self.store.has_cert_for_request(request));

        if covered {
            debug!("certificates already present for every configured domain");
            Ok(LifecycleState::CheckRenewal)
        } else {
            Ok(LifecycleState::BeginCreation)
        }
    }

    /// CheckRenewal: scan on the schedule until something is due
    async fn check_renewal(&self) -> Result<LifecycleState> {
        loop {
            let (Some(period), Some(days)) = (
                self.renewal.check_period(),
                self.renewal.renew_days_in_advance,
            ) else {
                info!("automatic certificate renewal is not configured; stopping lifecycle");
                return Ok(LifecycleState::Terminal);
            };

            debug!("reloading existing certificates");
            self.load_existing().await?;

            let requests = self.enumerator.domains(true).await?;
            for request in requests.iter() {
                for domain in request.domains() {
                    let due = match self.store.get(domain) {
                        None => true,
                        Some(cert) => cert.expires_within(days),
                    };

                    if due {
                        info!(domain = %domain, "certificate missing or due for renewal");
                        self.emit(LifecycleEvent::RenewalDue {
                            domain: domain.to_string(),
                        });
                        return Ok(LifecycleState::BeginCreation);
                    }
                }
            }

            debug!(
                period_secs = period.as_secs(),
                "nothing due for renewal; sleeping until the next check"
            );
            tokio::time::sleep(period).await;
        }
    }

    /// BeginCreation: acquire for every unsatisfied request, then persist
    async fn begin_creation(&self) -> Result<LifecycleState> {
        let requests = self.enumerator.domains(false).await?;

        let account = self.acquirer.get_or_create_account().await?;
        info!(
            account = %account.id,
            acquirer = self.acquirer.name(),
            "using issuance account"
        );

        let mut saves = Vec::new();

        for request in requests.iter() {
            // Re-check per-domain validity so a renewal triggered by one
            // domain does not reorder certificates that are still fine.
            if let Some(days) = self.renewal.renew_days_in_advance
                && self.renewal.is_configured()
                && request.domains().iter().all(|domain| {
                    self.store
                        .get(domain)
                        .is_some_and(|cert| !cert.expires_within(days))
                })
            {
                debug!(
                    primary = %request.primary(),
                    "skipping request; its certificates are still valid"
                );
                self.emit(LifecycleEvent::CreationSkipped {
                    primary: request.primary().to_string(),
                });
                continue;
            }

            info!(domains = ?request.domains(), "creating certificate");

            let cert = match self.acquirer.create_certificate(request).await {
                Ok(cert) => cert,
                Err(err) => {
                    error!(
                        domains = ?request.domains(),
                        error = %err,
                        "failed to create a certificate"
                    );
                    return Err(err);
                }
            };

            info!(
                subject = %cert.subject(),
                thumbprint = %cert.thumbprint(),
                "created certificate"
            );
            self.emit(LifecycleEvent::CertificateAcquired {
                subject: cert.subject().to_string(),
                thumbprint: cert.thumbprint().to_string(),
                not_after: cert.not_after(),
            });

            let cert = self.store.add_certificate(cert);
            saves.push(self.persist(cert));
        }

        // Fan-in: every request's persistence completes before the state does
        let mut failures = Vec::new();
        for outcome in join_all(saves).await {
            match outcome {
                Ok(()) => {}
                Err(Error::Persistence { failures: batch }) => failures.extend(batch),
                Err(other) => return Err(other),
            }
        }

        if !failures.is_empty() {
            return Err(Error::persistence(failures));
        }

        Ok(LifecycleState::CheckRenewal)
    }

    /// Fan a certificate out to every repository
    ///
    /// Every repository receives its save attempt regardless of how the
    /// others fare; failures are collected, and the overall operation is
    /// not considered complete before the settling floor elapses.
    async fn persist(&self, cert: Arc<CertificateRecord>) -> Result<()> {
        let saves: Vec<_> = self
            .repositories
            .iter()
            .map(|repository| {
                let repository = Arc::clone(repository);
                let cert = Arc::clone(&cert);
                async move {
                    let outcome = repository.save(&cert).await;
                    (repository.name(), outcome)
                }
            })
            .collect();

        let (results, ()) = tokio::join!(join_all(saves), tokio::time::sleep(self.settle_floor));

        let mut failures = Vec::new();
        for (name, outcome) in results {
            if let Err(err) = outcome {
                warn!(
                    repository = name,
                    error = %err,
                    "failed to persist certificate"
                );
                self.emit(LifecycleEvent::PersistenceFailed {
                    repository: name.to_string(),
                    error: err.to_string(),
                });
                failures.push(RepositoryFailure {
                    repository: name.to_string(),
                    message: err.to_string(),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::persistence(failures))
        }
    }

    /// Load every repository's certificates into the store, newest first
    ///
    /// Inserting newer certificates first means a certificate that is
    /// immediately superseded never triggers the chain-validation side
    /// effect.
    async fn load_existing(&self) -> Result<()> {
        let mut certs = Vec::new();
        for repository in &self.repositories {
            debug!(repository = repository.name(), "loading certificates");
            certs.extend(repository.get_certificates().await?);
        }

        certs.sort_by(|a, b| b.not_after().cmp(&a.not_after()));

        let count = certs.len();
        for cert in certs {
            debug!(subject = %cert.subject(), "loading certificate");
            self.store.add_certificate(cert);
        }

        self.emit(LifecycleEvent::CertificatesLoaded { count });
        Ok(())
    }

    fn unwind_on_error(&self, next: Result<LifecycleState>) -> Result<LifecycleState> {
        match next {
            Ok(state) => Ok(state),
            Err(err) => {
                self.emit(LifecycleEvent::Stopped {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Emit a lifecycle event
    fn emit(&self, event: LifecycleEvent) {
        // The channel is bounded; a slow consumer loses events rather than
        // stalling the lifecycle task.
        if self.event_tx.try_send(event).is_err() {
            warn!("lifecycle event channel full, dropping event");
        }
    }
}

impl std::fmt::Debug for CertificateLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateLifecycle")
            .field("repositories", &self.repositories.len())
            .field("renewal", &self.renewal)
            .field("settle_floor", &self.settle_floor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_state_is_absorbing() {
        assert!(LifecycleState::Terminal.is_terminal());
        assert!(!LifecycleState::Startup.is_terminal());
    }

    #[test]
    fn events_are_comparable() {
        let event = LifecycleEvent::RenewalDue {
            domain: "example.com".to_string(),
        };
        assert_eq!(event.clone(), event);
    }
}
