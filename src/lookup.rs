// impctl - CLI for the impCentral device management API
// Copyright (C) 2025 The impctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Remote entity lookup over the impCentral API.
//!
//! Listings are narrowed server-side with the `filter[...]` params the API
//! supports; attribute matching itself happens client-side because the API
//! has no name filter. Attributes are tried in registry order and the
//! first attribute producing any match wins; genuine duplicates within one
//! attribute are returned as-is for the resolver to reject.

use anyhow::Result;
use serde_json::Value;

use crate::client::{ApiClient, ResponseData};
use crate::entity::EntityType;
use crate::resolve::{EntityLookup, EntityRecord, ResolvedEntity};

pub struct ApiLookup<'a> {
    client: &'a ApiClient,
}

impl<'a> ApiLookup<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    fn list(&self, entity: EntityType, scope: &[ResolvedEntity]) -> Result<Vec<EntityRecord>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        for parent in scope {
            if let Some(param) = entity.scope_filter(parent.entity_type) {
                query.push((param, parent.id.clone()));
            }
        }
        let response = self.client.get(entity.collection_path(), &query)?;
        Ok(records_from(&response))
    }
}

impl EntityLookup for ApiLookup<'_> {
    fn find_by_id(&self, entity: EntityType, id: &str) -> Result<Option<EntityRecord>> {
        let path = format!("{}/{}", entity.collection_path(), id);
        let response = self.client.get_optional(&path, &[])?;
        Ok(response.as_ref().and_then(single_record_from))
    }

    fn find_by_attributes(
        &self,
        entity: EntityType,
        attributes: &[&str],
        value: &str,
        scope: &[ResolvedEntity],
    ) -> Result<Vec<EntityRecord>> {
        // An account reference may be a literal id; probe that first, then
        // fall back to an attribute search over the listing.
        if entity == EntityType::Account
            && let Some(record) = self.find_by_id(entity, value)?
        {
            return Ok(vec![record]);
        }

        let records = self.list(entity, scope)?;
        for attribute in attributes {
            let matched: Vec<EntityRecord> = records
                .iter()
                .filter(|r| r.attribute(attribute) == Some(value))
                .cloned()
                .collect();
            if !matched.is_empty() {
                return Ok(matched);
            }
        }
        Ok(Vec::new())
    }
}

fn records_from(response: &ResponseData) -> Vec<EntityRecord> {
    let Some(json) = &response.json else {
        return Vec::new();
    };
    match json.get("data") {
        Some(Value::Array(items)) => items.iter().filter_map(entity_record).collect(),
        Some(item @ Value::Object(_)) => entity_record(item).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn single_record_from(response: &ResponseData) -> Option<EntityRecord> {
    response
        .json
        .as_ref()
        .and_then(|json| json.get("data"))
        .and_then(entity_record)
}

fn entity_record(item: &Value) -> Option<EntityRecord> {
    let id = item.get("id")?.as_str()?.to_string();
    let attributes = item
        .get("attributes")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));
    Some(EntityRecord { id, attributes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn record(id: &str, attrs: Value) -> Value {
        json!({"id": id, "type": "x", "attributes": attrs})
    }

    #[test]
    fn scoped_search_sends_filter_params() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/devicegroups")
                .query_param("filter[product.id]", "p-1");
            then.status(200).json_body(json!({"data": [
                record("dg-1", json!({"name": "beta"})),
                record("dg-2", json!({"name": "prod"})),
            ]}));
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        let lookup = ApiLookup::new(&client);
        let scope = [ResolvedEntity::new("p-1", EntityType::Product)];
        let matches = lookup
            .find_by_attributes(EntityType::DeviceGroup, &["name"], "beta", &scope)
            .unwrap();

        mock.assert();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "dg-1");
    }

    #[test]
    fn first_matching_attribute_wins() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/devices");
            then.status(200).json_body(json!({"data": [
                record("d-1", json!({"name": "0c:2a", "mac_address": "ff:ff"})),
                record("d-2", json!({"name": "office", "mac_address": "0c:2a"})),
            ]}));
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        let lookup = ApiLookup::new(&client);
        let matches = lookup
            .find_by_attributes(
                EntityType::Device,
                EntityType::Device.lookup_attributes(),
                "0c:2a",
                &[],
            )
            .unwrap();

        // d-1 matches on name, the preferred attribute; the mac_address
        // match on d-2 is never reached.
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "d-1");
    }

    #[test]
    fn duplicates_within_one_attribute_are_all_returned() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/devicegroups");
            then.status(200).json_body(json!({"data": [
                record("dg-1", json!({"name": "dup"})),
                record("dg-2", json!({"name": "dup"})),
            ]}));
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        let lookup = ApiLookup::new(&client);
        let matches = lookup
            .find_by_attributes(EntityType::DeviceGroup, &["name"], "dup", &[])
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn account_value_is_probed_as_an_id_first() {
        let server = MockServer::start();
        let by_id = server.mock(|when, then| {
            when.method(GET).path("/accounts/acct-7");
            then.status(200)
                .json_body(json!({"data": record("acct-7", json!({"username": "ann"}))}));
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        let lookup = ApiLookup::new(&client);
        let matches = lookup
            .find_by_attributes(
                EntityType::Account,
                EntityType::Account.lookup_attributes(),
                "acct-7",
                &[],
            )
            .unwrap();

        by_id.assert();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "acct-7");
    }

    #[test]
    fn account_falls_back_to_username_search() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/accounts/ann");
            then.status(404).json_body(json!({"errors": []}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/accounts");
            then.status(200).json_body(json!({"data": [
                record("acct-7", json!({"username": "ann", "email": "ann@example.test"})),
                record("acct-8", json!({"username": "bob", "email": "bob@example.test"})),
            ]}));
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        let lookup = ApiLookup::new(&client);
        let matches = lookup
            .find_by_attributes(
                EntityType::Account,
                EntityType::Account.lookup_attributes(),
                "ann",
                &[],
            )
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "acct-7");
    }

    #[test]
    fn find_by_id_returns_none_for_missing_entities() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/products/ghost");
            then.status(404).json_body(json!({"errors": []}));
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        let lookup = ApiLookup::new(&client);
        assert!(
            lookup
                .find_by_id(EntityType::Product, "ghost")
                .unwrap()
                .is_none()
        );
    }
}
