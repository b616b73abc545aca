//! IAM documents for roles assumed by Kubernetes service accounts (IRSA).

use serde_json::{json, Value};

/// The annotation binding a service account to an IAM role.
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account_id, role_name)
}

/// Lets the service account `namespace/service_account` of the cluster behind
/// `oidc_provider_id` assume the role.
pub fn irsa_trust_policy(
    account_id: &str,
    oidc_provider_id: &str,
    namespace: &str,
    service_account: &str,
) -> String {
    let provider_arn = format!("arn:aws:iam::{}:oidc-provider/{}", account_id, oidc_provider_id);
    let subject = format!("system:serviceaccount:{}:{}", namespace, service_account);
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Federated": provider_arn },
            "Action": "sts:AssumeRoleWithWebIdentity",
            "Condition": {
                "StringEquals": { format!("{}:sub", oidc_provider_id): subject }
            }
        }]
    })
    .to_string()
}

/// Allows `actions` on `resource`.
pub fn access_policy(actions: &[&str], resource: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": actions,
            "Resource": resource
        }]
    })
    .to_string()
}

/// The `iam_roles_with_policies` variable of the database and search modules.
pub fn role_with_policies(role_name: &str, trust_policy: &str, access_policy: &str) -> Value {
    json!({
        "role_name": role_name,
        "trust_policy": trust_policy,
        "access_policy": access_policy,
    })
}
