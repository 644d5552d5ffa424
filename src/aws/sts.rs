use std::collections::BTreeMap;
use std::future::Future;

use aws_sdk_sts::Client as StsClient;
use aws_sdk_sts::operation::assume_role::{
    AssumeRoleInput as SdkAssumeRoleInput, AssumeRoleOutput,
};
use aws_sdk_sts::types::{PolicyDescriptorType, Tag};
use aws_smithy_types::error::operation::BuildError;
use tracing::{debug, info};

use super::{Credentials, IdentityState, IdentityStore};
use crate::constants::DEFAULT_SESSION_NAME;
use crate::context::CallContext;
use crate::error::{BoxError, Error, Result};
use crate::validators;

/// Caller-facing assume-role settings
///
/// Optional values left empty are omitted from the STS call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub session_name: Option<String>,
    pub external_id: Option<String>,
    pub duration_seconds: Option<i32>,
    pub policy_arns: Vec<String>,
    pub policy: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub transitive_tag_keys: Vec<String>,
}

/// The exact set of parameters sent to STS `AssumeRole`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleInput {
    pub role_arn: String,
    pub role_session_name: String,
    pub external_id: Option<String>,
    pub duration_seconds: Option<i32>,
    pub policy_arns: Option<Vec<String>>,
    pub policy: Option<String>,
    /// Sorted by key
    pub tags: Option<Vec<(String, String)>>,
    pub transitive_tag_keys: Option<Vec<String>>,
}

impl AssumeRoleRequest {
    pub fn new(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if validators::is_valid_role_arn(&self.role_arn) {
            Ok(())
        } else {
            Err(Error::InvalidRoleArn(self.role_arn.clone()))
        }
    }

    /// Build the outbound call, dropping every empty or non-positive field.
    pub fn to_input(&self) -> AssumeRoleInput {
        AssumeRoleInput {
            role_arn: self.role_arn.clone(),
            role_session_name: non_empty(&self.session_name)
                .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string()),
            external_id: non_empty(&self.external_id),
            duration_seconds: self.duration_seconds.filter(|secs| *secs > 0),
            policy_arns: (!self.policy_arns.is_empty()).then(|| self.policy_arns.clone()),
            policy: non_empty(&self.policy),
            tags: (!self.tags.is_empty()).then(|| {
                self.tags
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            }),
            transitive_tag_keys: (!self.transitive_tag_keys.is_empty())
                .then(|| self.transitive_tag_keys.clone()),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Role-assumption capability
///
/// `identity` is the caller identity the call must be signed with.
pub trait AssumeRoleApi: Send + Sync {
    fn assume_role(
        &self,
        identity: &IdentityState,
        input: &AssumeRoleInput,
    ) -> impl Future<Output = Result<Credentials, BoxError>> + Send;
}

/// STS-backed [`AssumeRoleApi`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkStsClient;

impl AssumeRoleApi for SdkStsClient {
    async fn assume_role(
        &self,
        identity: &IdentityState,
        input: &AssumeRoleInput,
    ) -> Result<Credentials, BoxError> {
        let request = sdk_input(input)?;
        let config = identity.load_sdk_config().await;
        let client = StsClient::new(&config);

        let response = client
            .assume_role()
            .set_role_arn(request.role_arn)
            .set_role_session_name(request.role_session_name)
            .set_external_id(request.external_id)
            .set_duration_seconds(request.duration_seconds)
            .set_policy_arns(request.policy_arns)
            .set_policy(request.policy)
            .set_tags(request.tags)
            .set_transitive_tag_keys(request.transitive_tag_keys)
            .send()
            .await?;

        credentials_from(&response)
    }
}

/// Translate the outbound parameters into the SDK's `AssumeRole` input.
/// Absent fields stay unset so STS applies its own defaults.
fn sdk_input(input: &AssumeRoleInput) -> Result<SdkAssumeRoleInput, BuildError> {
    let policy_arns = input.policy_arns.as_ref().map(|arns| {
        arns.iter()
            .map(|arn| PolicyDescriptorType::builder().arn(arn).build())
            .collect()
    });
    let tags = input
        .tags
        .as_ref()
        .map(|tags| {
            tags.iter()
                .map(|(key, value)| Tag::builder().key(key).value(value).build())
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    SdkAssumeRoleInput::builder()
        .role_arn(&input.role_arn)
        .role_session_name(&input.role_session_name)
        .set_external_id(input.external_id.clone())
        .set_duration_seconds(input.duration_seconds)
        .set_policy_arns(policy_arns)
        .set_policy(input.policy.clone())
        .set_tags(tags)
        .set_transitive_tag_keys(input.transitive_tag_keys.clone())
        .build()
}

fn credentials_from(response: &AssumeRoleOutput) -> Result<Credentials, BoxError> {
    let sts_creds = response
        .credentials()
        .ok_or("AWS STS returned no credentials")?;

    Ok(
        Credentials::new(sts_creds.access_key_id(), sts_creds.secret_access_key())
            .with_session_token(sts_creds.session_token())
            .with_expiration(*sts_creds.expiration()),
    )
}

/// Exchanges the store's active identity for a role's temporary credentials
#[derive(Debug, Clone)]
pub struct RoleAssumer<A> {
    api: A,
}

impl<A: AssumeRoleApi> RoleAssumer<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Assume the requested role and replace the store's credentials with
    /// the returned ones. On any failure the store is left untouched.
    pub async fn assume(
        &self,
        store: &IdentityStore,
        request: &AssumeRoleRequest,
        ctx: &CallContext,
    ) -> Result<()> {
        request.validate()?;
        let input = request.to_input();

        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", input.role_arn);
        debug!("Session name: {}", input.role_session_name);
        if let Some(duration) = input.duration_seconds {
            debug!("Duration: {} seconds", duration);
        }

        let identity = store
            .snapshot()
            .map_err(|e| Error::AssumeRoleFailed(Box::new(e)))?;

        let credentials = ctx
            .run(self.api.assume_role(&identity, &input))
            .await
            .map_err(|e| Error::AssumeRoleFailed(Box::new(e)))?
            .map_err(Error::AssumeRoleFailed)?;

        store
            .replace_credentials(credentials)
            .map_err(|e| Error::AssumeRoleFailed(Box::new(e)))?;

        info!("Successfully assumed role {}", input.role_arn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/TestRole";

    /// Records every input and answers with a fixed outcome
    #[derive(Default)]
    struct StubSts {
        calls: Mutex<Vec<AssumeRoleInput>>,
        fail: bool,
    }

    impl StubSts {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<AssumeRoleInput> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AssumeRoleApi for &StubSts {
        async fn assume_role(
            &self,
            _identity: &IdentityState,
            input: &AssumeRoleInput,
        ) -> Result<Credentials, BoxError> {
            self.calls.lock().unwrap().push(input.clone());
            if self.fail {
                return Err("AccessDenied: not authorized to perform sts:AssumeRole".into());
            }
            Ok(Credentials::new("A2", "S2").with_session_token("T2"))
        }
    }

    fn store() -> IdentityStore {
        IdentityStore::initialize("AK", "SK", "us-west-2").unwrap()
    }

    #[test]
    fn test_to_input_minimal_request_omits_optionals() {
        let input = AssumeRoleRequest::new(ROLE_ARN).to_input();

        assert_eq!(input.role_arn, ROLE_ARN);
        assert_eq!(input.role_session_name, DEFAULT_SESSION_NAME);
        assert_eq!(input.external_id, None);
        assert_eq!(input.duration_seconds, None);
        assert_eq!(input.policy_arns, None);
        assert_eq!(input.policy, None);
        assert_eq!(input.tags, None);
        assert_eq!(input.transitive_tag_keys, None);
    }

    #[test]
    fn test_to_input_drops_empty_and_non_positive_values() {
        let request = AssumeRoleRequest {
            session_name: Some(String::new()),
            external_id: Some(String::new()),
            duration_seconds: Some(0),
            policy: Some(String::new()),
            ..AssumeRoleRequest::new(ROLE_ARN)
        };
        let input = request.to_input();

        assert_eq!(input.role_session_name, DEFAULT_SESSION_NAME);
        assert_eq!(input.external_id, None);
        assert_eq!(input.duration_seconds, None);
        assert_eq!(input.policy, None);

        let negative = AssumeRoleRequest {
            duration_seconds: Some(-60),
            ..AssumeRoleRequest::new(ROLE_ARN)
        };
        assert_eq!(negative.to_input().duration_seconds, None);
    }

    #[test]
    fn test_to_input_full_request() {
        let request = AssumeRoleRequest {
            role_arn: ROLE_ARN.to_string(),
            session_name: Some("audit".to_string()),
            external_id: Some("ext-42".to_string()),
            duration_seconds: Some(900),
            policy_arns: vec![
                "arn:aws:iam::aws:policy/ReadOnlyAccess".to_string(),
                "arn:aws:iam::aws:policy/AWSOrganizationsReadOnlyAccess".to_string(),
            ],
            policy: Some(r#"{"Version":"2012-10-17","Statement":[]}"#.to_string()),
            tags: BTreeMap::from([
                ("Team".to_string(), "platform".to_string()),
                ("Env".to_string(), "prod".to_string()),
                ("CostCenter".to_string(), "42".to_string()),
            ]),
            transitive_tag_keys: vec!["Team".to_string(), "Env".to_string()],
        };
        let input = request.to_input();

        assert_eq!(input.role_session_name, "audit");
        assert_eq!(input.external_id.as_deref(), Some("ext-42"));
        assert_eq!(input.duration_seconds, Some(900));
        assert_eq!(
            input.policy_arns.unwrap(),
            vec![
                "arn:aws:iam::aws:policy/ReadOnlyAccess",
                "arn:aws:iam::aws:policy/AWSOrganizationsReadOnlyAccess",
            ]
        );
        assert!(input.policy.is_some());
        assert_eq!(
            input.tags.unwrap(),
            vec![
                ("CostCenter".to_string(), "42".to_string()),
                ("Env".to_string(), "prod".to_string()),
                ("Team".to_string(), "platform".to_string()),
            ]
        );
        assert_eq!(input.transitive_tag_keys.unwrap(), vec!["Team", "Env"]);
    }

    #[tokio::test]
    async fn test_assume_replaces_credentials() {
        let sts = StubSts::default();
        let assumer = RoleAssumer::new(&sts);
        let store = store();

        let request = AssumeRoleRequest {
            session_name: Some("s".to_string()),
            duration_seconds: Some(3600),
            ..AssumeRoleRequest::new(ROLE_ARN)
        };
        assumer
            .assume(&store, &request, &CallContext::background())
            .await
            .unwrap();

        let state = store.snapshot().unwrap();
        assert_eq!(
            state.credentials,
            Credentials::new("A2", "S2").with_session_token("T2")
        );
        assert_eq!(state.region, "us-west-2");

        let calls = sts.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].role_session_name, "s");
        assert_eq!(calls[0].duration_seconds, Some(3600));
    }

    #[tokio::test]
    async fn test_assume_failure_leaves_store_unchanged() {
        let sts = StubSts::failing();
        let assumer = RoleAssumer::new(&sts);
        let store = store();
        store.overlay_session_token("ambient").unwrap();
        let before = store.snapshot().unwrap();

        let result = assumer
            .assume(
                &store,
                &AssumeRoleRequest::new(ROLE_ARN),
                &CallContext::background(),
            )
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, Error::AssumeRoleFailed(_)));
        assert!(
            std::error::Error::source(&err)
                .unwrap()
                .to_string()
                .contains("AccessDenied")
        );
        assert_eq!(*store.snapshot().unwrap(), *before);
    }

    #[tokio::test]
    async fn test_assume_rejects_invalid_arn_without_calling() {
        let sts = StubSts::default();
        let assumer = RoleAssumer::new(&sts);

        let result = assumer
            .assume(
                &store(),
                &AssumeRoleRequest::new("arn:aws:iam::123:user/Bob"),
                &CallContext::background(),
            )
            .await;

        assert!(matches!(result, Err(Error::InvalidRoleArn(_))));
        assert!(sts.calls().is_empty());
    }

    #[tokio::test]
    async fn test_assume_cancelled_before_call() {
        let sts = StubSts::default();
        let assumer = RoleAssumer::new(&sts);
        let store = store();
        let (ctx, handle) = CallContext::background().cancellable();
        handle.cancel();

        let err = assumer
            .assume(&store, &AssumeRoleRequest::new(ROLE_ARN), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AssumeRoleFailed(_)));
        assert!(err.is_cancellation());
        assert!(sts.calls().is_empty());
        assert_eq!(store.snapshot().unwrap().credentials.access_key_id(), "AK");
    }

    #[tokio::test]
    async fn test_assume_uses_current_identity() {
        struct EchoSts {
            seen: AtomicUsize,
        }

        impl AssumeRoleApi for EchoSts {
            async fn assume_role(
                &self,
                identity: &IdentityState,
                _input: &AssumeRoleInput,
            ) -> Result<Credentials, BoxError> {
                self.seen.fetch_add(1, Ordering::SeqCst);
                let prev = identity.credentials.access_key_id();
                Ok(Credentials::new(format!("{prev}+"), "S").with_session_token("T"))
            }
        }

        let assumer = RoleAssumer::new(EchoSts {
            seen: AtomicUsize::new(0),
        });
        let store = store();
        let request = AssumeRoleRequest::new(ROLE_ARN);
        let ctx = CallContext::background();

        assumer.assume(&store, &request, &ctx).await.unwrap();
        assumer.assume(&store, &request, &ctx).await.unwrap();

        assert_eq!(store.snapshot().unwrap().credentials.access_key_id(), "AK++");
        assert_eq!(assumer.api.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_assume_reports_poisoned_store_under_assume_stage() {
        struct PoisoningSts<'a> {
            store: &'a IdentityStore,
        }

        impl AssumeRoleApi for PoisoningSts<'_> {
            async fn assume_role(
                &self,
                _identity: &IdentityState,
                _input: &AssumeRoleInput,
            ) -> Result<Credentials, BoxError> {
                self.store.poison();
                Ok(Credentials::new("A2", "S2").with_session_token("T2"))
            }
        }

        let store = store();
        let err = RoleAssumer::new(PoisoningSts { store: &store })
            .assume(
                &store,
                &AssumeRoleRequest::new(ROLE_ARN),
                &CallContext::background(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AssumeRoleFailed(_)));
        let cause = std::error::Error::source(&err).unwrap();
        assert!(matches!(
            cause.downcast_ref::<Error>(),
            Some(Error::CredentialRetrievalFailed(_))
        ));
    }

    fn full_request() -> AssumeRoleRequest {
        AssumeRoleRequest {
            role_arn: ROLE_ARN.to_string(),
            session_name: Some("audit".to_string()),
            external_id: Some("ext-42".to_string()),
            duration_seconds: Some(900),
            policy_arns: vec![
                "arn:aws:iam::aws:policy/ReadOnlyAccess".to_string(),
                "arn:aws:iam::aws:policy/AWSOrganizationsReadOnlyAccess".to_string(),
            ],
            policy: Some(r#"{"Version":"2012-10-17","Statement":[]}"#.to_string()),
            tags: BTreeMap::from([
                ("Team".to_string(), "platform".to_string()),
                ("Env".to_string(), "prod".to_string()),
            ]),
            transitive_tag_keys: vec!["Team".to_string()],
        }
    }

    #[test]
    fn test_sdk_input_leaves_absent_fields_unset() {
        let sdk = sdk_input(&AssumeRoleRequest::new(ROLE_ARN).to_input()).unwrap();

        assert_eq!(sdk.role_arn(), Some(ROLE_ARN));
        assert_eq!(sdk.role_session_name(), Some(DEFAULT_SESSION_NAME));
        assert_eq!(sdk.external_id(), None);
        assert_eq!(sdk.duration_seconds(), None);
        assert_eq!(sdk.policy(), None);
        assert!(sdk.policy_arns.is_none());
        assert!(sdk.tags.is_none());
        assert!(sdk.transitive_tag_keys.is_none());
    }

    #[test]
    fn test_sdk_input_carries_every_field_in_order() {
        let sdk = sdk_input(&full_request().to_input()).unwrap();

        assert_eq!(sdk.role_session_name(), Some("audit"));
        assert_eq!(sdk.external_id(), Some("ext-42"));
        assert_eq!(sdk.duration_seconds(), Some(900));
        assert_eq!(sdk.policy(), full_request().policy.as_deref());

        let arns: Vec<_> = sdk
            .policy_arns
            .as_deref()
            .unwrap()
            .iter()
            .map(|policy| policy.arn())
            .collect();
        assert_eq!(
            arns,
            vec![
                Some("arn:aws:iam::aws:policy/ReadOnlyAccess"),
                Some("arn:aws:iam::aws:policy/AWSOrganizationsReadOnlyAccess"),
            ]
        );

        let tags: Vec<_> = sdk
            .tags
            .as_deref()
            .unwrap()
            .iter()
            .map(|tag| (tag.key(), tag.value()))
            .collect();
        assert_eq!(tags, vec![("Env", "prod"), ("Team", "platform")]);
        assert_eq!(sdk.transitive_tag_keys.as_deref(), Some(&["Team".to_string()][..]));
    }

    #[test]
    fn test_credentials_from_response() {
        let expiration = aws_smithy_types::DateTime::from_secs(1_700_000_000);
        let sts_creds = aws_sdk_sts::types::Credentials::builder()
            .access_key_id("ASIAROLE")
            .secret_access_key("role-secret")
            .session_token("role-token")
            .expiration(expiration)
            .build()
            .unwrap();
        let response = AssumeRoleOutput::builder().credentials(sts_creds).build();

        let creds = credentials_from(&response).unwrap();
        assert_eq!(creds.access_key_id(), "ASIAROLE");
        assert_eq!(creds.secret_access_key(), "role-secret");
        assert_eq!(creds.session_token(), Some("role-token"));
        assert_eq!(creds.expiration(), Some(expiration));

        let empty = AssumeRoleOutput::builder().build();
        assert!(credentials_from(&empty).is_err());
    }
}
