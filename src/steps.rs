//! The ordered step table
//!
//! Categories run strictly in this order; later categories reference
//! earlier ones (locators need assets, policies and filters; live outputs
//! need assets).

use crate::cli::Category;
use crate::context::RunContext;
use crate::replicators::{
    AssetReconciler, ContentKeyPolicyReconciler, LiveEventReconciler, StreamingLocatorReconciler,
    VerbatimReconciler,
};
use converge::{BuildFn, FailurePolicy, Orchestrator, Reconciler};
use mediakit::{
    AssetProperties, ContentKeyPolicyProperties, FilterProperties, LiveEventProperties,
    LiveOutputProperties, ResourceKind, StreamingEndpointProperties, StreamingLocatorProperties,
    TransformProperties,
};

/// Pair each category, in run order, with its reconciler factory
pub fn table<C>(policy: FailurePolicy, builds: [BuildFn<C>; 7]) -> Orchestrator<C> {
    Category::ALL
        .into_iter()
        .zip(builds)
        .fold(Orchestrator::new(policy), |orchestrator, (category, build)| {
            orchestrator.step(category.key(), category.label(), build)
        })
}

/// Orchestrator over the connected accounts
pub fn orchestrator(policy: FailurePolicy) -> Orchestrator<RunContext> {
    let builds: [BuildFn<RunContext>; 7] = [
        account_filters,
        transforms,
        content_key_policies,
        streaming_endpoints,
        assets,
        streaming_locators,
        live_events,
    ];
    table(policy, builds)
}

fn account_filters(ctx: &RunContext) -> Box<dyn Reconciler + '_> {
    Box::new(VerbatimReconciler::new(
        Category::AccountFilters.label(),
        ctx.pair::<FilterProperties>(ResourceKind::AccountFilter),
        &ctx.settings,
    ))
}

fn transforms(ctx: &RunContext) -> Box<dyn Reconciler + '_> {
    Box::new(VerbatimReconciler::new(
        Category::Transforms.label(),
        ctx.pair::<TransformProperties>(ResourceKind::Transform),
        &ctx.settings,
    ))
}

fn content_key_policies(ctx: &RunContext) -> Box<dyn Reconciler + '_> {
    Box::new(ContentKeyPolicyReconciler::new(
        ctx.pair::<ContentKeyPolicyProperties>(ResourceKind::ContentKeyPolicy),
        &*ctx.source,
        &ctx.settings,
    ))
}

fn streaming_endpoints(ctx: &RunContext) -> Box<dyn Reconciler + '_> {
    Box::new(VerbatimReconciler::new(
        Category::StreamingEndpoints.label(),
        ctx.pair::<StreamingEndpointProperties>(ResourceKind::StreamingEndpoint),
        &ctx.settings,
    ))
}

fn assets(ctx: &RunContext) -> Box<dyn Reconciler + '_> {
    Box::new(AssetReconciler::new(
        ctx.pair::<AssetProperties>(ResourceKind::Asset),
        ctx.children::<FilterProperties>(ResourceKind::AssetFilter),
        &ctx.content,
        &ctx.settings,
    ))
}

fn streaming_locators(ctx: &RunContext) -> Box<dyn Reconciler + '_> {
    Box::new(StreamingLocatorReconciler::new(
        ctx.pair::<StreamingLocatorProperties>(ResourceKind::StreamingLocator),
        &*ctx.source,
        &ctx.settings,
    ))
}

fn live_events(ctx: &RunContext) -> Box<dyn Reconciler + '_> {
    Box::new(LiveEventReconciler::new(
        ctx.pair::<LiveEventProperties>(ResourceKind::LiveEvent),
        ctx.children::<LiveOutputProperties>(ResourceKind::LiveOutput),
        &ctx.settings,
    ))
}
