//! HTTPRoute reconciliation
//!
//! Compiles the routing block of an AppOnboarding into an HTTPRoute attached
//! to one listener of a shared Gateway, then upserts it.

use kube::ResourceExt;
use tracing::debug;

use super::{Context, PhaseError};
use crate::conditions::{reasons, set_condition, ROUTING_READY};
use crate::crd::{AppOnboarding, AppOnboardingStatus, ConditionStatus, ObjectRef, RoutingSpec};
use crate::events::{actions, OnboardingEvent};
use crate::gateway::{
    BackendRef, Gateway, HttpPathMatch, HttpRoute, HttpRouteMatch, HttpRouteRule, HttpRouteSpec,
    ParentRef, GATEWAY_API_GROUP, SECTION_HTTP, SECTION_HTTPS,
};
use crate::kube_utils::{upsert, HasApiResource, ObjectMeta, UpsertStage};
use crate::{naming, Error, ANNOTATION_TLS_ENABLED};

/// Compile the HTTPRoute for an AppOnboarding.
///
/// One match per configured route, all in a single rule pointing at the
/// backend Service. An empty route list yields an empty match list.
pub fn compile_route(
    onboarding: &AppOnboarding,
    routing: &RoutingSpec,
    gateway: &ObjectRef,
) -> Result<HttpRoute, Error> {
    let name = onboarding.name_any();
    let tls = routing.tls_enabled();

    let mut metadata = ObjectMeta::owned_by(naming::route_name(&name), onboarding)?;
    if !tls {
        metadata = metadata.with_annotation(ANNOTATION_TLS_ENABLED, "false");
    }

    let matches = routing
        .routes
        .iter()
        .map(|route| HttpRouteMatch {
            path: Some(HttpPathMatch {
                type_: route.path_type.gateway_api_value().to_string(),
                value: route.path_prefix.clone(),
            }),
        })
        .collect();

    let backend = &onboarding.spec.service;
    Ok(HttpRoute::new(
        metadata,
        HttpRouteSpec {
            parent_refs: vec![ParentRef {
                group: Some(GATEWAY_API_GROUP.to_string()),
                kind: Some(Gateway::KIND.to_string()),
                name: gateway.name.clone(),
                namespace: Some(gateway.namespace.clone()),
                section_name: Some((if tls { SECTION_HTTPS } else { SECTION_HTTP }).to_string()),
            }],
            hostnames: vec![onboarding.spec.hostname.clone()],
            rules: vec![HttpRouteRule {
                matches,
                backend_refs: vec![BackendRef {
                    kind: Some("Service".to_string()),
                    name: backend.name.clone(),
                    port: backend.port,
                }],
            }],
        },
    ))
}

/// Ensure the HTTPRoute matches the spec and record `RoutingReady`.
pub async fn reconcile_routing(
    onboarding: &AppOnboarding,
    ctx: &Context,
    status: &mut AppOnboardingStatus,
) -> Result<(), PhaseError> {
    let name = onboarding.name_any();
    let namespace = onboarding.namespace().unwrap_or_default();
    let generation = onboarding.metadata.generation;
    let route_name = naming::route_name(&name);

    let Some(routing) = onboarding.spec.routing.as_ref() else {
        ctx.kube
            .delete_object(&HttpRoute::api_resource(), &namespace, &route_name)
            .await
            .map_err(|e| PhaseError::new(reasons::UPDATE_FAILED, e))
            .map_err(|f| record_failure(status, generation, f))?;
        status.gateway_ref = None;
        let message = "spec.routing is not set; no HTTPRoute is created";
        set_condition(
            &mut status.conditions,
            ROUTING_READY,
            ConditionStatus::False,
            reasons::ROUTING_NOT_CONFIGURED,
            message,
            generation,
        );
        ctx.publish(
            onboarding,
            OnboardingEvent::normal(reasons::ROUTING_NOT_CONFIGURED, actions::ROUTE, message),
        )
        .await;
        return Ok(());
    };

    let result = apply_route(onboarding, ctx, routing).await;
    match result {
        Ok(gateway) => {
            let message = format!(
                "HTTPRoute {route_name} attached to gateway {}/{}",
                gateway.namespace, gateway.name
            );
            status.gateway_ref = Some(gateway);
            set_condition(
                &mut status.conditions,
                ROUTING_READY,
                ConditionStatus::True,
                reasons::HTTP_ROUTE_READY,
                message.clone(),
                generation,
            );
            ctx.publish(
                onboarding,
                OnboardingEvent::normal(
                    reasons::HTTP_ROUTE_READY,
                    actions::ROUTE,
                    message,
                ),
            )
            .await;
            Ok(())
        }
        Err(failure) => {
            ctx.publish(
                onboarding,
                OnboardingEvent::warning(
                    failure.reason,
                    actions::ROUTE,
                    failure.error.to_string(),
                ),
            )
            .await;
            Err(record_failure(status, generation, failure))
        }
    }
}

async fn apply_route(
    onboarding: &AppOnboarding,
    ctx: &Context,
    routing: &RoutingSpec,
) -> Result<ObjectRef, PhaseError> {
    let gateway = ctx.config.gateways.gateway_for(onboarding.spec.gateway);
    let found = ctx
        .kube
        .get_object(&Gateway::api_resource(), &gateway.namespace, &gateway.name)
        .await
        .map_err(|e| PhaseError::new(reasons::RECONCILING, e))?;
    if found.is_none() {
        return Err(PhaseError::new(
            reasons::GATEWAY_NOT_FOUND,
            Error::GatewayNotFound {
                namespace: gateway.namespace.clone(),
                name: gateway.name.clone(),
            },
        ));
    }

    let route = compile_route(onboarding, routing, &gateway)
        .map_err(|e| PhaseError::new(reasons::CREATION_FAILED, e))?;
    let outcome = upsert(ctx.kube.as_ref(), &route).await.map_err(|e| {
        let reason = match e.stage {
            UpsertStage::Create => reasons::CREATION_FAILED,
            UpsertStage::Update => reasons::UPDATE_FAILED,
        };
        PhaseError::new(reason, e.source)
    })?;
    debug!(route = %route.metadata.name, ?outcome, "HTTPRoute upserted");

    Ok(gateway)
}

fn record_failure(
    status: &mut AppOnboardingStatus,
    generation: Option<i64>,
    failure: PhaseError,
) -> PhaseError {
    set_condition(
        &mut status.conditions,
        ROUTING_READY,
        ConditionStatus::False,
        failure.reason,
        failure.error.to_string(),
        generation,
    );
    failure
}
