//! Source selection for a single query.
//!
//! Routing is two pure steps: [`plan_route`] picks the sources to consult from the
//! top retrieval score, and [`settle_route`] resolves that plan against what the
//! sources actually returned.

use serde::Serialize;
use sift_memory::ScoredChunk;

use crate::config::RouterConfig;

/// Sources to consult before any of them has answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    DocumentsOnly,
    WebOnly,
    Mixed,
}

impl Route {
    #[must_use]
    pub fn needs_web(self) -> bool {
        matches!(self, Self::WebOnly | Self::Mixed)
    }
}

/// Final routing outcome after source failures were absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    DocumentsOnly,
    WebOnly,
    Mixed,
    GeneralKnowledge,
    Failed,
}

impl RouteDecision {
    #[must_use]
    pub fn uses_web(self) -> bool {
        matches!(self, Self::WebOnly | Self::Mixed)
    }

    #[must_use]
    pub fn uses_documents(self) -> bool {
        matches!(self, Self::DocumentsOnly | Self::Mixed)
    }
}

/// Which sources produced usable context for this query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceAvailability {
    pub documents: bool,
    pub web: bool,
}

/// Choose the sources for a query. `top_score` is `None` when retrieval returned nothing.
#[must_use]
pub fn plan_route(top_score: Option<f32>, force_web_search: bool, config: &RouterConfig) -> Route {
    let Some(top) = top_score else {
        return Route::WebOnly;
    };
    if force_web_search {
        return Route::WebOnly;
    }
    if top >= config.similarity_threshold {
        Route::DocumentsOnly
    } else if config.mixed_band > 0.0 && top >= config.blend_floor() {
        Route::Mixed
    } else {
        Route::WebOnly
    }
}

/// Resolve a planned route against the sources that actually delivered context.
#[must_use]
pub fn settle_route(
    route: Route,
    available: SourceAvailability,
    allow_general_knowledge: bool,
) -> RouteDecision {
    match route {
        Route::DocumentsOnly => RouteDecision::DocumentsOnly,
        Route::Mixed if available.web => RouteDecision::Mixed,
        Route::Mixed => RouteDecision::DocumentsOnly,
        Route::WebOnly if available.web => RouteDecision::WebOnly,
        Route::WebOnly if available.documents => RouteDecision::DocumentsOnly,
        Route::WebOnly if allow_general_knowledge => RouteDecision::GeneralKnowledge,
        Route::WebOnly => RouteDecision::Failed,
    }
}

/// Chunks that may enter the context for a settled decision.
///
/// A planned documents or mixed route keeps chunks at or above the blend floor. A
/// web route that fell back to documents keeps everything that was retrieved.
#[must_use]
pub fn select_chunks(
    route: Route,
    decision: RouteDecision,
    hits: Vec<ScoredChunk>,
    config: &RouterConfig,
) -> Vec<ScoredChunk> {
    match (route, decision) {
        (_, RouteDecision::WebOnly | RouteDecision::GeneralKnowledge | RouteDecision::Failed) => {
            Vec::new()
        }
        (Route::WebOnly, _) => hits,
        (Route::DocumentsOnly | Route::Mixed, _) => {
            let floor = config.blend_floor();
            hits.into_iter().filter(|h| h.score >= floor).collect()
        }
    }
}
