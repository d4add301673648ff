//! OIDC enforcement
//!
//! Resolves the identity provider, optionally provisions the client, checks
//! the client secret exists, then upserts a SecurityPolicy targeting the
//! HTTPRoute. The SecurityPolicy is only written once its Secret is known to
//! exist.

use kube::ResourceExt;
use tracing::{debug, warn};

use super::{Context, PhaseError};
use crate::conditions::{reasons, set_condition, AUTH_READY};
use crate::crd::{AppOnboarding, AppOnboardingStatus, AuthSpec, ConditionStatus, ObjectRef};
use crate::events::{actions, OnboardingEvent};
use crate::gateway::{HttpRoute, GATEWAY_API_GROUP};
use crate::kube_utils::{controller_owner_ref, upsert, HasApiResource, ObjectMeta};
use crate::naming::{self, CLIENT_SECRET_KEY};
use crate::policy::{
    OidcConfig, OidcProvider, SecretObjectReference, SecurityPolicy, SecurityPolicySpec, TargetRef,
};
use crate::provider::{ClientRequest, IdentityProvider};
use crate::Error;

/// Scopes requested when the spec lists none
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Secret the SecurityPolicy reads the client secret from.
///
/// Provisioned clients always write `<name>-oidc-client` in the
/// AppOnboarding's namespace so the Secret can be owned by it.
pub fn credential_ref(onboarding: &AppOnboarding, auth: &AuthSpec) -> ObjectRef {
    let name = onboarding.name_any();
    let namespace = onboarding.namespace().unwrap_or_default();
    match (&auth.client_secret_ref, auth.provision_client) {
        (Some(secret), false) => ObjectRef::new(
            secret.name.clone(),
            secret.namespace.clone().unwrap_or(namespace),
        ),
        _ => ObjectRef::new(naming::client_secret_name(&name), namespace),
    }
}

fn tls_enabled(onboarding: &AppOnboarding) -> bool {
    onboarding
        .spec
        .routing
        .as_ref()
        .map(|r| r.tls_enabled())
        .unwrap_or(true)
}

/// Client registration request for a provisioning provider
pub fn client_request(
    onboarding: &AppOnboarding,
    provider: &dyn IdentityProvider,
    secret: &ObjectRef,
) -> Result<ClientRequest, Error> {
    let name = onboarding.name_any();
    let namespace = onboarding.namespace().unwrap_or_default();
    let hostname = &onboarding.spec.hostname;
    let tls = tls_enabled(onboarding);
    let redirect = onboarding
        .spec
        .auth
        .as_ref()
        .and_then(|a| a.redirect_url.clone())
        .unwrap_or_else(|| naming::redirect_url(hostname, tls));

    Ok(ClientRequest {
        client_id: provider.client_id(&namespace, &name),
        display_name: format!("{namespace}/{name}"),
        namespace,
        redirect_uris: vec![redirect],
        web_origins: vec![naming::origin(hostname, tls)],
        secret_name: secret.name.clone(),
        owner: controller_owner_ref(onboarding)?,
    })
}

/// Compile the SecurityPolicy for an AppOnboarding
pub fn compile_security_policy(
    onboarding: &AppOnboarding,
    auth: &AuthSpec,
    client_id: String,
    issuer: String,
    secret: &ObjectRef,
) -> Result<SecurityPolicy, Error> {
    let name = onboarding.name_any();
    let namespace = onboarding.namespace().unwrap_or_default();
    let redirect_url = auth
        .redirect_url
        .clone()
        .unwrap_or_else(|| naming::redirect_url(&onboarding.spec.hostname, tls_enabled(onboarding)));
    let scopes = if auth.scopes.is_empty() {
        DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
    } else {
        auth.scopes.clone()
    };

    Ok(SecurityPolicy::new(
        ObjectMeta::owned_by(naming::security_policy_name(&name), onboarding)?,
        SecurityPolicySpec {
            target_refs: vec![TargetRef {
                group: GATEWAY_API_GROUP.to_string(),
                kind: HttpRoute::KIND.to_string(),
                name: naming::route_name(&name),
            }],
            oidc: OidcConfig {
                provider: OidcProvider { issuer },
                client_id,
                client_secret: SecretObjectReference {
                    name: secret.name.clone(),
                    namespace: (secret.namespace != namespace).then(|| secret.namespace.clone()),
                },
                redirect_url,
                scopes,
            },
        },
    ))
}

/// Ensure OIDC enforcement matches the spec and record `AuthReady`.
pub async fn reconcile_auth(
    onboarding: &AppOnboarding,
    ctx: &Context,
    status: &mut AppOnboardingStatus,
) -> Result<(), PhaseError> {
    let generation = onboarding.metadata.generation;

    let Some(auth) = onboarding.spec.enabled_auth() else {
        let name = onboarding.name_any();
        let namespace = onboarding.namespace().unwrap_or_default();
        if let Err(e) = ctx
            .kube
            .delete_object(
                &SecurityPolicy::api_resource(),
                &namespace,
                &naming::security_policy_name(&name),
            )
            .await
        {
            return Err(record_failure(
                status,
                generation,
                PhaseError::new(reasons::SECURITY_POLICY_FAILED, e),
            ));
        }
        status.client_secret_ref = None;
        let message = "authentication is disabled";
        set_condition(
            &mut status.conditions,
            AUTH_READY,
            ConditionStatus::False,
            reasons::AUTH_DISABLED,
            message,
            generation,
        );
        ctx.publish(
            onboarding,
            OnboardingEvent::normal(reasons::AUTH_DISABLED, actions::AUTHENTICATE, message),
        )
        .await;
        return Ok(());
    };

    match enforce(onboarding, auth, ctx).await {
        Ok(secret) => {
            let message = format!(
                "SecurityPolicy {} enforces OIDC via provider {}",
                naming::security_policy_name(&onboarding.name_any()),
                auth.provider
            );
            status.client_secret_ref = Some(secret);
            set_condition(
                &mut status.conditions,
                AUTH_READY,
                ConditionStatus::True,
                reasons::AUTH_CONFIGURED,
                message.clone(),
                generation,
            );
            ctx.publish(
                onboarding,
                OnboardingEvent::normal(
                    reasons::AUTH_CONFIGURED,
                    actions::AUTHENTICATE,
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
                    actions::AUTHENTICATE,
                    failure.error.to_string(),
                ),
            )
            .await;
            Err(record_failure(status, generation, failure))
        }
    }
}

async fn enforce(
    onboarding: &AppOnboarding,
    auth: &AuthSpec,
    ctx: &Context,
) -> Result<ObjectRef, PhaseError> {
    if onboarding.spec.routing.is_none() {
        return Err(PhaseError::new(
            reasons::VALIDATION_FAILED,
            Error::validation("auth requires spec.routing: the SecurityPolicy targets the HTTPRoute"),
        ));
    }

    let provider = ctx
        .providers
        .resolve(&auth.provider)
        .map_err(|e| PhaseError::new(reasons::INVALID_PROVIDER, e))?;
    let secret = credential_ref(onboarding, auth);

    if auth.provision_client {
        if provider.supports_provisioning() {
            let request = client_request(onboarding, provider.as_ref(), &secret)
                .map_err(|e| PhaseError::new(reasons::PROVISIONING_FAILED, e))?;
            let provisioned = provider
                .provision_client(&request)
                .await
                .map_err(|e| PhaseError::new(reasons::PROVISIONING_FAILED, e))?;
            debug!(client_id = %provisioned.client_id, created = provisioned.created, "client provisioned");
        } else {
            warn!(
                provider = %auth.provider,
                "provisionClient is set but the provider cannot provision clients; expecting an existing secret"
            );
        }
    }

    check_credential(ctx, &secret).await?;

    let issuer = provider
        .issuer_url(auth)
        .map_err(|e| PhaseError::new(reasons::SECURITY_POLICY_FAILED, e))?;
    let client_id = provider.client_id(
        &onboarding.namespace().unwrap_or_default(),
        &onboarding.name_any(),
    );
    let policy = compile_security_policy(onboarding, auth, client_id, issuer, &secret)
        .map_err(|e| PhaseError::new(reasons::SECURITY_POLICY_FAILED, e))?;
    let outcome = upsert(ctx.kube.as_ref(), &policy)
        .await
        .map_err(|e| PhaseError::new(reasons::SECURITY_POLICY_FAILED, e.source))?;
    debug!(policy = %policy.metadata.name, ?outcome, "SecurityPolicy upserted");

    Ok(secret)
}

/// The client secret must exist and carry the expected key
async fn check_credential(ctx: &Context, secret: &ObjectRef) -> Result<(), PhaseError> {
    let missing = |detail: &str| {
        PhaseError::new(
            reasons::VALIDATION_FAILED,
            Error::MissingCredential {
                namespace: secret.namespace.clone(),
                name: secret.name.clone(),
                detail: detail.to_string(),
            },
        )
    };

    let found = ctx
        .kube
        .get_secret(&secret.namespace, &secret.name)
        .await
        .map_err(|e| PhaseError::new(reasons::RECONCILING, e))?;
    let Some(found) = found else {
        return Err(missing("secret not found"));
    };
    let has_key = found
        .data
        .as_ref()
        .is_some_and(|d| d.contains_key(CLIENT_SECRET_KEY))
        || found
            .string_data
            .as_ref()
            .is_some_and(|d| d.contains_key(CLIENT_SECRET_KEY));
    if !has_key {
        return Err(missing(&format!("missing key '{CLIENT_SECRET_KEY}'")));
    }
    Ok(())
}

fn record_failure(
    status: &mut AppOnboardingStatus,
    generation: Option<i64>,
    failure: PhaseError,
) -> PhaseError {
    set_condition(
        &mut status.conditions,
        AUTH_READY,
        ConditionStatus::False,
        failure.reason,
        failure.error.to_string(),
        generation,
    );
    failure
}
