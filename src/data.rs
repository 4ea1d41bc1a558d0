use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// ACME store payload: the account used to talk to the CA and every
/// certificate it obtained. Binary fields hold base64 text as stored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StoredData {
    pub account: Option<Account>,
    #[serde(default, deserialize_with = "nullable")]
    pub certificates: Vec<Certificate>,
    #[serde(rename = "HTTPChallenges", default, deserialize_with = "nullable")]
    pub http_challenges: HashMap<String, HashMap<String, String>>,
    #[serde(rename = "TLSChallenges", default, deserialize_with = "nullable")]
    pub tls_challenges: HashMap<String, Certificate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    #[serde(default)]
    pub email: String,
    /// Registration resource as returned by the CA.
    #[serde(default)]
    pub registration: Option<Value>,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub key_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    pub domain: Domain,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Domain {
    #[serde(rename = "Main", default)]
    pub main: String,
    #[serde(rename = "SANs", default, deserialize_with = "nullable")]
    pub sans: Vec<String>,
}

impl StoredData {
    /// Certificate whose main domain or SANs include `domain`.
    pub fn certificate_for(&self, domain: &str) -> Option<&Certificate> {
        self.certificates
            .iter()
            .find(|c| c.domain.main == domain || c.domain.sans.iter().any(|s| s == domain))
    }
}

// Empty collections are written as `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
