use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::repos::UsersRepo;
use crate::application::users::UserService;
use crate::cache::{CacheConfig, CacheInvalidator, CacheService};
use crate::config::{AppEnvironment, Settings};

use super::rate_limit::ApiRateLimiter;

const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;

/// HTTP-facing subset of [`Settings`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub environment: AppEnvironment,
    pub trust_proxy: bool,
    pub body_limit_bytes: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    pub cache: CacheConfig,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            environment: AppEnvironment::Development,
            trust_proxy: false,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            cache: CacheConfig::default(),
        }
    }
}

impl From<&Settings> for HttpOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            environment: settings.app.environment,
            trust_proxy: settings.server.trust_proxy,
            body_limit_bytes: settings.server.body_limit(),
            rate_limit_window: Duration::from_secs(u64::from(
                settings.rate_limit.window_seconds.get(),
            )),
            rate_limit_max_requests: settings.rate_limit.max_requests.get(),
            cache: CacheConfig::from(&settings.cache),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub users: UserService,
    pub repo: Arc<dyn UsersRepo>,
    pub cache: CacheService,
    /// Whether a store was reachable at startup. Routes stay cached either
    /// way; a disconnected store behaves as a failing one.
    pub cache_enabled: bool,
    pub rate_limiter: Arc<ApiRateLimiter>,
    pub options: Arc<HttpOptions>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(repo: Arc<dyn UsersRepo>, cache: CacheService, options: HttpOptions) -> Self {
        let cache_enabled = cache.is_connected();
        let users =
            UserService::new(repo.clone()).with_invalidator(CacheInvalidator::new(cache.clone()));
        let rate_limiter =
            ApiRateLimiter::new(options.rate_limit_window, options.rate_limit_max_requests);

        Self {
            users,
            repo,
            cache,
            cache_enabled,
            rate_limiter: Arc::new(rate_limiter),
            options: Arc::new(options),
            started_at: Instant::now(),
        }
    }

    pub fn environment(&self) -> AppEnvironment {
        self.options.environment
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
