use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use docgate_core::{Identity, RequestContext, RequestInfo};
use docgate_storage::Backend;

use crate::auth::{AuthError, Credential};
use crate::error::GatewayError;
use crate::identity::IdentityResolver;
use crate::metrics::Metrics;
use crate::recorder::{AuditRecorder, Outcome};

/// A business operation run inside the envelope. Implementations must pass the
/// gate before touching `backend`.
pub trait Operation<B: Backend>: Send + 'static {
    type Output: Send + 'static;

    const SUCCESS_STATUS: u16 = 200;

    fn execute(
        self,
        ctx: &mut RequestContext,
        backend: &B,
    ) -> impl Future<Output = Result<Self::Output, GatewayError>> + Send;
}

/// Runs one call end to end: resolve identity, execute, record exactly once.
pub struct Envelope<B: Backend, R: IdentityResolver> {
    backend: Arc<B>,
    resolver: R,
    recorder: AuditRecorder,
    metrics: Arc<Metrics>,
}

impl<B: Backend, R: IdentityResolver + 'static> Envelope<B, R> {
    pub fn new(backend: Arc<B>, resolver: R, recorder: AuditRecorder, metrics: Arc<Metrics>) -> Self {
        Self {
            backend,
            resolver,
            recorder,
            metrics,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn token_path(&self) -> &str {
        self.recorder.token_path()
    }

    pub async fn run<O: Operation<B>>(
        &self,
        request: RequestInfo,
        credential: Credential,
        op: O,
    ) -> Result<O::Output, GatewayError> {
        let identity = match self.resolve(credential).await {
            Ok(identity) => identity,
            Err(e) => {
                let error = GatewayError::Authentication(e);
                let ctx = RequestContext::new(Identity::anonymous());
                self.recorder
                    .record(
                        self.backend.audit(),
                        ctx.into_snapshot(),
                        request,
                        Outcome::failed(&error),
                    )
                    .await;
                return Err(error);
            }
        };

        self.execute(RequestContext::new(identity), request, op).await
    }

    /// For calls that carry no identity, such as token issuance.
    pub async fn run_anonymous<O: Operation<B>>(
        &self,
        request: RequestInfo,
        op: O,
    ) -> Result<O::Output, GatewayError> {
        self.execute(RequestContext::new(Identity::anonymous()), request, op)
            .await
    }

    /// Like `run`, but on its own task so the record is still written if the
    /// caller goes away mid-call.
    pub async fn run_detached<O: Operation<B>>(
        self: Arc<Self>,
        request: RequestInfo,
        credential: Option<Credential>,
        op: O,
    ) -> Result<O::Output, GatewayError> {
        let envelope = self;
        let task = tokio::spawn(async move {
            match credential {
                Some(credential) => envelope.run(request, credential, op).await,
                None => envelope.run_anonymous(request, op).await,
            }
        });
        task.await
            .unwrap_or_else(|e| Err(GatewayError::unclassified("JoinError", e.to_string())))
    }

    async fn resolve(&self, credential: Credential) -> Result<Identity, AuthError> {
        match credential {
            Credential::Missing => Err(AuthError::MissingCredential),
            Credential::Malformed => Err(AuthError::MalformedCredential),
            Credential::Bearer(token) => self.resolver.resolve(&token).await,
        }
    }

    async fn execute<O: Operation<B>>(
        &self,
        mut ctx: RequestContext,
        request: RequestInfo,
        op: O,
    ) -> Result<O::Output, GatewayError> {
        let started = Instant::now();
        let result = match AssertUnwindSafe(op.execute(&mut ctx, &self.backend))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(GatewayError::from_panic(payload)),
        };

        let outcome = match &result {
            Ok(_) => Outcome::Completed {
                status_code: O::SUCCESS_STATUS,
                latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
            Err(e) => {
                if matches!(e, GatewayError::Authorization(_)) {
                    self.metrics.record_authorization_denial();
                }
                Outcome::failed(e)
            }
        };

        self.recorder
            .record(self.backend.audit(), ctx.into_snapshot(), request, outcome)
            .await;
        result
    }
}
