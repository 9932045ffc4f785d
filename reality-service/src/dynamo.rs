// Copyright (C) 2026 StarHuntingGames
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

//! DynamoDB-backed [`RealityDocumentStore`].
//!
//! Items are keyed by `game_key`, the game id a reality was written under.
//! Reads are consistent `GetItem`s. Writes are a single `UpdateItem` that
//! only sets `record_id` when the item does not have one yet.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    Client as DynamoClient,
    types::{
        AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType, ReturnValue,
        ScalarAttributeType,
    },
};
use chrono::{DateTime, Utc};
use reality_common::Reality;
use tracing::{debug, info};

use crate::store::{RealityDocumentStore, RealityRecord};

const GAME_KEY: &str = "game_key";
const RECORD_ID: &str = "record_id";
const GAME_ID: &str = "game_id";
const GAME_MAP: &str = "game_map";
const PLAYERS: &str = "players";
const UPDATED_AT: &str = "updated_at";

const NEW_RECORD_ID: &str = ":new_record_id";

/// Attributes overwritten on every upsert, with their value placeholders.
const PAYLOAD_ATTRIBUTES: [(&str, &str); 4] = [
    (GAME_ID, ":game_id"),
    (GAME_MAP, ":game_map"),
    (PLAYERS, ":players"),
    (UPDATED_AT, ":updated_at"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub table_name: String,
    pub endpoint: Option<String>,
    pub auto_create_table: bool,
}

impl StoreSettings {
    /// `None` unless `REALITY_TABLE` or `DYNAMODB_ENDPOINT` is set. A bare
    /// `AWS_REGION` is not enough: the Lambda runtime always sets it.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let table_name = non_empty("REALITY_TABLE");
        let endpoint = non_empty("DYNAMODB_ENDPOINT");
        if table_name.is_none() && endpoint.is_none() {
            return None;
        }

        Some(Self {
            table_name: table_name.unwrap_or_else(|| "realities".to_string()),
            endpoint,
            auto_create_table: non_empty("REALITY_TABLE_AUTO_CREATE")
                .map(|value| !matches!(value.as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
        })
    }
}

#[derive(Clone)]
pub struct DynamoRealityStore {
    client: DynamoClient,
    table_name: String,
    auto_create_table: bool,
}

impl DynamoRealityStore {
    pub async fn from_env() -> Option<Self> {
        let settings = StoreSettings::from_lookup(|name| std::env::var(name).ok())?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = settings.endpoint.as_ref() {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        info!(table_name = %settings.table_name, "reality DynamoDB store enabled");
        Some(Self {
            client: DynamoClient::new(&config),
            table_name: settings.table_name,
            auto_create_table: settings.auto_create_table,
        })
    }

    pub fn auto_create_table(&self) -> bool {
        self.auto_create_table
    }

    /// Creates the table unless it already exists.
    pub async fn ensure_table(&self) -> anyhow::Result<()> {
        let definition = table_definition()?;
        let result = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .set_attribute_definitions(Some(definition.attribute_definitions))
            .set_key_schema(Some(definition.key_schema))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(table_name = %self.table_name, "created reality table");
                Ok(())
            }
            Err(error) => {
                let error = error.into_service_error();
                if error.is_resource_in_use_exception() {
                    info!(table_name = %self.table_name, "reality table already exists");
                    return Ok(());
                }
                Err(anyhow::Error::new(error)
                    .context(format!("failed to create table {}", self.table_name)))
            }
        }
    }
}

#[async_trait]
impl RealityDocumentStore for DynamoRealityStore {
    async fn find_by_game_key(&self, game_key: &str) -> anyhow::Result<Vec<RealityRecord>> {
        let request = get_request(game_key);
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(request.key))
            .consistent_read(request.consistent_read)
            .send()
            .await
            .context("failed to get item from reality table")?;

        Ok(output
            .item()
            .map(record_from_item)
            .transpose()?
            .into_iter()
            .collect())
    }

    async fn upsert_record(
        &self,
        record: &RealityRecord,
        new_record_id: &str,
    ) -> anyhow::Result<u64> {
        let request = upsert_request(record, new_record_id)?;
        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(request.key))
            .update_expression(request.update_expression)
            .set_expression_attribute_names(Some(request.expression_attribute_names))
            .set_expression_attribute_values(Some(request.expression_attribute_values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .context("failed to update item in reality table")?;

        let Some(attributes) = output.attributes() else {
            return Ok(0);
        };
        if let Ok(record_id) = string_attribute(attributes, RECORD_ID) {
            debug!(game_key = %record.game_key, record_id = %record_id, "reality item written");
        }
        Ok(1)
    }
}

struct TableDefinition {
    attribute_definitions: Vec<AttributeDefinition>,
    key_schema: Vec<KeySchemaElement>,
}

fn table_definition() -> anyhow::Result<TableDefinition> {
    Ok(TableDefinition {
        attribute_definitions: vec![
            AttributeDefinition::builder()
                .attribute_name(GAME_KEY)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        ],
        key_schema: vec![
            KeySchemaElement::builder()
                .attribute_name(GAME_KEY)
                .key_type(KeyType::Hash)
                .build()?,
        ],
    })
}

struct GetRequest {
    key: HashMap<String, AttributeValue>,
    consistent_read: bool,
}

fn get_request(game_key: &str) -> GetRequest {
    GetRequest {
        key: item_key(game_key),
        consistent_read: true,
    }
}

#[derive(Debug)]
struct UpsertRequest {
    key: HashMap<String, AttributeValue>,
    update_expression: String,
    expression_attribute_names: HashMap<String, String>,
    expression_attribute_values: HashMap<String, AttributeValue>,
}

fn upsert_request(record: &RealityRecord, new_record_id: &str) -> anyhow::Result<UpsertRequest> {
    let mut assignments = vec![format!(
        "#{RECORD_ID} = if_not_exists(#{RECORD_ID}, {NEW_RECORD_ID})"
    )];
    let mut names = HashMap::from([(format!("#{RECORD_ID}"), RECORD_ID.to_string())]);
    for (attribute, placeholder) in PAYLOAD_ATTRIBUTES {
        assignments.push(format!("#{attribute} = {placeholder}"));
        names.insert(format!("#{attribute}"), attribute.to_string());
    }

    let reality = &record.reality;
    let values = HashMap::from([
        (
            NEW_RECORD_ID.to_string(),
            AttributeValue::S(new_record_id.to_string()),
        ),
        (
            ":game_id".to_string(),
            AttributeValue::S(reality.game_id.clone()),
        ),
        (
            ":game_map".to_string(),
            AttributeValue::S(serde_json::to_string(&reality.game_map)?),
        ),
        (
            ":players".to_string(),
            AttributeValue::S(serde_json::to_string(&reality.players)?),
        ),
        (
            ":updated_at".to_string(),
            AttributeValue::S(record.updated_at.to_rfc3339()),
        ),
    ]);

    Ok(UpsertRequest {
        key: item_key(&record.game_key),
        update_expression: format!("SET {}", assignments.join(", ")),
        expression_attribute_names: names,
        expression_attribute_values: values,
    })
}

fn item_key(game_key: &str) -> HashMap<String, AttributeValue> {
    HashMap::from([(GAME_KEY.to_string(), AttributeValue::S(game_key.to_string()))])
}

fn record_from_item(item: &HashMap<String, AttributeValue>) -> anyhow::Result<RealityRecord> {
    let game_key = string_attribute(item, GAME_KEY)?.clone();
    let game_map = serde_json::from_str(string_attribute(item, GAME_MAP)?)
        .with_context(|| format!("invalid game_map in reality item {game_key}"))?;
    let players = serde_json::from_str(string_attribute(item, PLAYERS)?)
        .with_context(|| format!("invalid players in reality item {game_key}"))?;
    let updated_at = string_attribute(item, UPDATED_AT)
        .ok()
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or_default();

    Ok(RealityRecord {
        record_id: string_attribute(item, RECORD_ID).ok().cloned(),
        reality: Reality {
            game_id: string_attribute(item, GAME_ID)?.clone(),
            game_map,
            players,
        },
        game_key,
        updated_at,
    })
}

fn string_attribute<'a>(
    item: &'a HashMap<String, AttributeValue>,
    name: &str,
) -> anyhow::Result<&'a String> {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .with_context(|| format!("reality item is missing string attribute {name}"))
}
