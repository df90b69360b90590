//! Static SCIM 1.1 discovery documents.
//!
//! `ServiceProviderConfigs` tells a provisioning client which features the
//! gateway supports; `Schemas` describes the User and Group attributes. Both
//! are built once and never touch the adapter.

use serde::Serialize;

use super::types::{SCHEMA_CORE, SCHEMA_GROUP, SCHEMA_USER};

/// Maximum number of results advertised for filtered queries.
pub const MAX_FILTER_RESULTS: u32 = 200;

// =============================================================================
// ServiceProviderConfigs
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderConfig {
    pub schemas: Vec<String>,
    pub patch: FeatureSupport,
    pub bulk: BulkSupport,
    pub filter: FilterSupport,
    pub change_password: FeatureSupport,
    pub sort: FeatureSupport,
    pub etag: FeatureSupport,
    pub xml_data_format: FeatureSupport,
    pub authentication_schemes: Vec<AuthenticationScheme>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureSupport {
    pub supported: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSupport {
    pub supported: bool,
    pub max_operations: u32,
    pub max_payload_size: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSupport {
    pub supported: bool,
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationScheme {
    pub name: String,
    pub description: String,
    pub spec_url: String,
}

impl Default for ServiceProviderConfig {
    fn default() -> Self {
        Self {
            schemas: vec![SCHEMA_CORE.to_string()],
            patch: FeatureSupport { supported: true },
            bulk: BulkSupport {
                supported: false,
                max_operations: 0,
                max_payload_size: 0,
            },
            filter: FilterSupport {
                supported: true,
                max_results: MAX_FILTER_RESULTS,
            },
            change_password: FeatureSupport { supported: true },
            sort: FeatureSupport { supported: false },
            etag: FeatureSupport { supported: false },
            xml_data_format: FeatureSupport { supported: false },
            authentication_schemes: vec![AuthenticationScheme {
                name: "HTTP Basic".to_string(),
                description: "Authentication using HTTP Basic credentials".to_string(),
                spec_url: "http://www.ietf.org/rfc/rfc2617.txt".to_string(),
            }],
        }
    }
}

// =============================================================================
// Schemas
// =============================================================================

/// `GET /Schemas` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemasResponse {
    pub schemas: Vec<String>,
    pub total_results: usize,
    #[serde(rename = "Resources")]
    pub resources: Vec<ResourceSchema>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchema {
    pub id: String,
    pub name: String,
    pub description: String,
    pub schema: String,
    pub endpoint: String,
    pub attributes: Vec<SchemaAttribute>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub multi_valued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_valued_attribute_child_name: Option<String>,
    pub description: String,
    pub schema: String,
    pub read_only: bool,
    pub required: bool,
    pub case_exact: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_attributes: Vec<SchemaAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Boolean,
    Complex,
    #[serde(rename = "dateTime")]
    DateTime,
}

impl SchemaAttribute {
    fn base(name: &str, attr_type: AttributeType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            attr_type,
            multi_valued: false,
            multi_valued_attribute_child_name: None,
            description: description.to_string(),
            schema: SCHEMA_CORE.to_string(),
            read_only: false,
            required: false,
            case_exact: false,
            sub_attributes: Vec::new(),
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::base(name, AttributeType::String, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::base(name, AttributeType::Boolean, description)
    }

    pub fn complex(name: &str, description: &str, sub_attributes: Vec<SchemaAttribute>) -> Self {
        Self {
            sub_attributes,
            ..Self::base(name, AttributeType::Complex, description)
        }
    }

    /// Multivalue attribute whose entries are discriminated by `type`.
    pub fn multi_valued(name: &str, child: &str, description: &str) -> Self {
        Self {
            multi_valued: true,
            multi_valued_attribute_child_name: Some(child.to_string()),
            sub_attributes: vec![
                Self::string("value", "The attribute's significant value"),
                Self::string("display", "A human readable name"),
                Self::string("type", "A label indicating the attribute's function"),
                Self::boolean("primary", "Whether this is the primary value"),
                Self::string("operation", "Resolved operation: create, modify or delete"),
            ],
            ..Self::base(name, AttributeType::Complex, description)
        }
    }

    fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn case_exact(mut self) -> Self {
        self.case_exact = true;
        self
    }
}

fn meta_attribute() -> SchemaAttribute {
    SchemaAttribute::complex(
        "meta",
        "Resource metadata",
        vec![
            SchemaAttribute::base("created", AttributeType::DateTime, "Creation time").read_only(),
            SchemaAttribute::base("lastModified", AttributeType::DateTime, "Last update time")
                .read_only(),
            SchemaAttribute::string("location", "URI of the resource").read_only(),
            SchemaAttribute::string("version", "Version of the resource").read_only(),
            SchemaAttribute::string(
                "attributes",
                "Names of attributes to remove during a PATCH operation",
            ),
        ],
    )
}

/// Core User schema.
pub fn user_schema() -> ResourceSchema {
    ResourceSchema {
        id: SCHEMA_USER.to_string(),
        name: "User".to_string(),
        description: "Core User".to_string(),
        schema: SCHEMA_CORE.to_string(),
        endpoint: "/Users".to_string(),
        attributes: vec![
            SchemaAttribute::string("id", "Unique identifier defined by the service provider")
                .read_only()
                .required()
                .case_exact(),
            SchemaAttribute::string("externalId", "Identifier defined by the provisioning client")
                .case_exact(),
            SchemaAttribute::string("userName", "Unique identifier for the user").required(),
            SchemaAttribute::complex(
                "name",
                "The components of the user's name",
                vec![
                    SchemaAttribute::string("formatted", "Full name"),
                    SchemaAttribute::string("familyName", "Family name"),
                    SchemaAttribute::string("givenName", "Given name"),
                    SchemaAttribute::string("middleName", "Middle name"),
                    SchemaAttribute::string("honorificPrefix", "Honorific prefix"),
                    SchemaAttribute::string("honorificSuffix", "Honorific suffix"),
                ],
            ),
            SchemaAttribute::string("displayName", "Name displayed to end-users"),
            SchemaAttribute::string("nickName", "Casual name"),
            SchemaAttribute::string("profileUrl", "URL of the user's online profile"),
            SchemaAttribute::string("title", "Title, such as \"Vice President\""),
            SchemaAttribute::string("userType", "Relationship to the organization"),
            SchemaAttribute::string("preferredLanguage", "Preferred written or spoken language"),
            SchemaAttribute::string("locale", "Default location"),
            SchemaAttribute::string("timezone", "Time zone in Olson format"),
            SchemaAttribute::boolean("active", "Administrative status"),
            SchemaAttribute::string("password", "Clear text password; never returned"),
            SchemaAttribute::multi_valued("emails", "email", "E-mail addresses"),
            SchemaAttribute::multi_valued("phoneNumbers", "phoneNumber", "Phone numbers"),
            SchemaAttribute::multi_valued("ims", "im", "Instant messaging addresses"),
            SchemaAttribute::multi_valued("photos", "photo", "URLs of photos"),
            SchemaAttribute::multi_valued("addresses", "address", "Physical mailing addresses"),
            SchemaAttribute::multi_valued("groups", "group", "Groups the user belongs to")
                .read_only(),
            SchemaAttribute::multi_valued("entitlements", "entitlement", "Entitlements"),
            SchemaAttribute::multi_valued("roles", "role", "Roles"),
            SchemaAttribute::multi_valued("x509Certificates", "x509Certificate", "Certificates"),
            meta_attribute(),
        ],
    }
}

/// Core Group schema.
pub fn group_schema() -> ResourceSchema {
    ResourceSchema {
        id: SCHEMA_GROUP.to_string(),
        name: "Group".to_string(),
        description: "Core Group".to_string(),
        schema: SCHEMA_CORE.to_string(),
        endpoint: "/Groups".to_string(),
        attributes: vec![
            SchemaAttribute::string("id", "Unique identifier defined by the service provider")
                .read_only()
                .required()
                .case_exact(),
            SchemaAttribute::string("externalId", "Identifier defined by the provisioning client")
                .case_exact(),
            SchemaAttribute::string("displayName", "Human readable name for the group")
                .required(),
            SchemaAttribute::multi_valued("members", "member", "Members of the group"),
            meta_attribute(),
        ],
    }
}

impl Default for SchemasResponse {
    fn default() -> Self {
        let resources = vec![user_schema(), group_schema()];
        Self {
            schemas: vec![SCHEMA_CORE.to_string()],
            total_results: resources.len(),
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_provider_config_shape() {
        let json = serde_json::to_value(ServiceProviderConfig::default()).unwrap();

        assert_eq!(json["schemas"][0], SCHEMA_CORE);
        assert_eq!(json["patch"]["supported"], true);
        assert_eq!(json["bulk"]["supported"], false);
        assert_eq!(json["filter"]["maxResults"], 200);
        assert_eq!(json["sort"]["supported"], false);
        assert_eq!(json["authenticationSchemes"][0]["name"], "HTTP Basic");
    }

    #[test]
    fn test_schemas_lists_user_and_group() {
        let json = serde_json::to_value(SchemasResponse::default()).unwrap();

        assert_eq!(json["totalResults"], 2);
        assert_eq!(json["Resources"][0]["id"], SCHEMA_USER);
        assert_eq!(json["Resources"][0]["endpoint"], "/Users");
        assert_eq!(json["Resources"][1]["id"], SCHEMA_GROUP);
    }

    #[test]
    fn test_multivalue_attributes_expose_type() {
        let user = user_schema();
        let emails = user
            .attributes
            .iter()
            .find(|a| a.name == "emails")
            .unwrap();

        assert!(emails.multi_valued);
        assert!(emails.sub_attributes.iter().any(|a| a.name == "type"));
    }

    #[test]
    fn test_user_name_required() {
        let json = serde_json::to_value(user_schema()).unwrap();
        let user_name = json["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["name"] == "userName")
            .unwrap();
        assert_eq!(user_name["required"], true);
        assert!(user_name.get("subAttributes").is_none());
    }
}
