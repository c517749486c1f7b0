//! Identity parsing for cost line items
//!
//! Each cloud encodes "what was billed" differently. Azure uses a resource
//! path of the form
//! `/subscriptions/{id}/resourceGroups/{name}/providers/{namespace}/{type}/{instance}`,
//! AWS reports carry a product code such as `AmazonEC2`. The parsers here
//! turn that identity into labels and fail with `MalformedIdentity` instead
//! of indexing past the end of a short path.

use crate::error::{CctError, Result};
use crate::types::{Cloud, Labels};

/// Minimum number of `/`-separated segments in an Azure resource path,
/// counting the empty segment before the leading slash.
const AZURE_MIN_SEGMENTS: usize = 8;

/// Components of an Azure resource path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureResource<'a> {
    /// Subscription GUID
    pub subscription: &'a str,
    /// Resource group name
    pub resource_group: &'a str,
    /// Resource provider namespace, e.g. `Microsoft.Compute`
    pub namespace: &'a str,
    /// Resource type, e.g. `disks`
    pub resource_type: &'a str,
    /// Trailing resource name, when present
    pub instance: Option<&'a str>,
}

impl AzureResource<'_> {
    /// Provider label, `{namespace}/{type}`
    pub fn provider(&self) -> String {
        format!("{}/{}", self.namespace, self.resource_type)
    }
}

/// Split an Azure resource path into its components
///
/// # Examples
/// ```
/// use cct_core::identity::parse_azure_resource;
///
/// let resource = parse_azure_resource(
///     "/subscriptions/X/resourceGroups/Y/providers/Microsoft.Compute/disks/data-1",
/// )
/// .unwrap();
/// assert_eq!(resource.resource_group, "Y");
/// assert_eq!(resource.instance, Some("data-1"));
/// ```
pub fn parse_azure_resource(identity: &str) -> Result<AzureResource<'_>> {
    let parts: Vec<&str> = identity.split('/').collect();
    if parts.len() < AZURE_MIN_SEGMENTS || parts[6].is_empty() || parts[7].is_empty() {
        return Err(CctError::MalformedIdentity(identity.to_string()));
    }

    Ok(AzureResource {
        subscription: parts[2],
        resource_group: parts[4],
        namespace: parts[6],
        resource_type: parts[7],
        instance: parts[AZURE_MIN_SEGMENTS..]
            .iter()
            .rev()
            .find(|segment| !segment.is_empty())
            .copied(),
    })
}

/// Extract the resource provider (`{namespace}/{type}`) from an Azure resource path
///
/// # Examples
/// ```
/// use cct_core::identity::provider_of;
///
/// let provider = provider_of(
///     "/subscriptions/X/resourceGroups/Y/providers/Microsoft.ContainerRegistry/registries/Z",
/// )
/// .unwrap();
/// assert_eq!(provider, "Microsoft.ContainerRegistry/registries");
/// ```
pub fn provider_of(identity: &str) -> Result<String> {
    parse_azure_resource(identity).map(|resource| resource.provider())
}

/// Build the identity-derived labels for a record from `cloud`
///
/// The returned map is freshly allocated on every call.
pub fn identity_labels(cloud: Cloud, identity: &str) -> Result<Labels> {
    let mut labels = Labels::new();
    match cloud {
        Cloud::Azure => {
            let resource = parse_azure_resource(identity)?;
            labels.insert("subscription".to_string(), resource.subscription.to_string());
            labels.insert(
                "resource_group".to_string(),
                resource.resource_group.to_string(),
            );
            labels.insert("service".to_string(), resource.provider());
            if let Some(instance) = resource.instance {
                labels.insert("instance".to_string(), instance.to_string());
            }
        }
        Cloud::Aws => {
            let service = identity.trim();
            if service.is_empty() {
                return Err(CctError::MalformedIdentity(identity.to_string()));
            }
            labels.insert("service".to_string(), service.to_string());
        }
    }
    Ok(labels)
}
