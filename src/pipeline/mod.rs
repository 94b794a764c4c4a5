//! Request admission and answer serving.
//!
//! # Data Flow
//! ```text
//! Arrived
//!     → resolve_identity (client IP behind proxies, rate key)
//!     → admit (sliding-window limiter)  ── Rejected: stop here
//!     → serve
//!         → cache hit                    ── Responded
//!         → cache miss → answer service → store → Responded
//! ```
//!
//! # Design Decisions
//! - Rate limiting is the outermost gate; nothing downstream runs on reject
//! - Limiter and cache locks are never held across the answer call
//! - Concurrent misses on one key may both compute; last store wins

pub mod answer;

use std::net::IpAddr;
use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::security::client_ip::{self, TrustPolicy};
use crate::security::rate_limit::{Decision, Quota, RateKey, Rejection, SlidingWindowLimiter};

pub use answer::{AnswerError, AnswerService, QueryAnswer, UpstreamAnswerService};

/// Raw per-request identity inputs.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Address of the direct TCP peer.
    pub peer: Option<IpAddr>,
    /// Raw `X-Forwarded-For` value.
    pub forwarded_for: Option<String>,
    /// Authenticated user asserted by the auth layer in front of us.
    pub user_id: Option<String>,
    /// Tenant asserted by the auth layer in front of us.
    pub tenant_id: Option<String>,
}

/// Who the request is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub client_ip: String,
    /// Only set when a trusted peer asserted it.
    pub user_id: Option<String>,
    /// Only set when a trusted peer asserted it.
    pub tenant_id: Option<String>,
    pub rate_key: RateKey,
}

/// A tenant query entering the pipeline.
#[derive(Debug, Clone)]
pub struct InboundQuery {
    pub meta: RequestMeta,
    pub tenant_id: String,
    pub query: String,
}

/// An answer and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub answer: QueryAnswer,
    pub cached: bool,
}

/// Terminal state of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rejected {
        identity: Identity,
        rejection: Rejection,
    },
    Responded {
        identity: Identity,
        quota: Quota,
        served: Served,
    },
}

/// Composes the trust policy, limiter, cache and answer service.
pub struct RequestPipeline {
    trust_policy: TrustPolicy,
    limiter: SlidingWindowLimiter,
    cache: ResponseCache<QueryAnswer>,
    answers: Arc<dyn AnswerService>,
}

impl RequestPipeline {
    pub fn new(config: &GatewayConfig, answers: Arc<dyn AnswerService>) -> Self {
        Self {
            trust_policy: TrustPolicy::parse(&config.proxy.trusted_proxies),
            limiter: SlidingWindowLimiter::new(&config.rate_limit),
            cache: ResponseCache::new(&config.cache),
            answers,
        }
    }

    /// Attribute a request to a client.
    ///
    /// User and tenant assertions count only when the direct peer is a
    /// trusted proxy; from anyone else they are dropped.
    pub fn resolve_identity(&self, meta: &RequestMeta) -> Identity {
        let client_ip =
            client_ip::resolve(meta.peer, meta.forwarded_for.as_deref(), &self.trust_policy);

        let vouched = self.trust_policy.vouches_for(meta.peer);
        if !vouched && (meta.user_id.is_some() || meta.tenant_id.is_some()) {
            tracing::debug!(
                client_ip = %client_ip,
                "Ignoring identity headers from untrusted peer"
            );
        }
        let user_id = meta.user_id.clone().filter(|_| vouched);
        let tenant_id = meta.tenant_id.clone().filter(|_| vouched);

        let rate_key = RateKey::for_request(user_id.as_deref(), &client_ip);
        Identity {
            client_ip,
            user_id,
            tenant_id,
            rate_key,
        }
    }

    /// Run the admission check. Rejections are logged, not raised.
    pub fn admit(&self, identity: &Identity) -> Decision {
        let decision = self.limiter.admit(&identity.rate_key);
        if let Decision::Rejected(rejection) = decision {
            tracing::warn!(
                client = %identity.rate_key,
                window = %rejection.window,
                retry_after = rejection.retry_after_secs(),
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(rejection.window.as_str());
        }
        decision
    }

    /// Answer from cache, or compute and store before returning.
    pub async fn serve(&self, tenant_id: &str, query: &str) -> Result<Served, AnswerError> {
        if let Some(answer) = self.cache.get(tenant_id, query) {
            return Ok(Served {
                answer,
                cached: true,
            });
        }

        let answer = match self.answers.answer(tenant_id, query).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(tenant = %tenant_id, error = %e, "Answer service failed");
                metrics::record_answer_error(e.kind());
                return Err(e);
            }
        };

        self.cache.put(tenant_id, query, answer.clone());
        Ok(Served {
            answer,
            cached: false,
        })
    }

    /// Full request lifecycle for callers outside the HTTP stack.
    pub async fn handle(&self, request: &InboundQuery) -> Result<Outcome, AnswerError> {
        let identity = self.resolve_identity(&request.meta);

        let quota = match self.admit(&identity) {
            Decision::Allowed(quota) => quota,
            Decision::Rejected(rejection) => {
                return Ok(Outcome::Rejected {
                    identity,
                    rejection,
                })
            }
        };

        let served = self.serve(&request.tenant_id, &request.query).await?;
        Ok(Outcome::Responded {
            identity,
            quota,
            served,
        })
    }

    /// Drop a tenant's cached answers. Called after every document ingestion.
    pub fn invalidate_tenant(&self, tenant_id: &str) -> usize {
        self.cache.invalidate_tenant(tenant_id)
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &ResponseCache<QueryAnswer> {
        &self.cache
    }

    pub fn trust_policy(&self) -> &TrustPolicy {
        &self.trust_policy
    }
}
