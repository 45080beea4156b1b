//! Flattens a ScoutSuite AWS results file into one JSON event per line.
//!
//! The results file is a JavaScript assignment (`scoutsuite_results =`) on its
//! first line followed by a single JSON document. Scalar top-level fields become
//! the template stamped onto every event; nested sections are exploded into
//! summary, filter, finding, external attack surface and inventory events.

use crate::error::{InventoryError, InventoryResult};
use crate::export::write_json_lines;
use chrono::{DateTime, TimeZone};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info, warn};

type Event = Map<String, Value>;

/// Resource collections emitted as inventory events, per service.
pub fn inventory_fields(service: &str) -> &'static [&'static str] {
    match service {
        "acm" => &["certificates"],
        "awslambda" => &["functions"],
        "cloudformation" => &["stacks"],
        "cloudtrail" => &["data_logging_trails", "trails"],
        "cloudwatch" => &["alarms"],
        "config" => &["recorders", "rules"],
        "directconnect" => &["connections"],
        "ec2" => &[
            "images",
            "instances",
            "network_interfaces",
            "security_groups",
            "snapshots",
            "volumes"
        ],
        "efs" => &["filesystems"],
        "elasticache" => &["clusters", "security_groups"],
        "elb" | "elbv2" => &["elb_policies"],
        "emr" => &["clusters"],
        "iam" => &[
            "credential_reports",
            "groups",
            "password_policy",
            "policies",
            "permissions",
            "roles",
            "users"
        ],
        "rds" => &[
            "instances",
            "parameter_groups",
            "security_groups",
            "snapshots",
            "subnet_groups"
        ],
        "redshift" => &["parameter_groups", "security_groups"],
        "route53" => &["domains", "hosted_zones"],
        "s3" => &["buckets"],
        "ses" => &["identities"],
        "sns" => &["topics"],
        "sqs" => &["queues"],
        "vpc" => &["flow_logs", "peering_connections", "vpcs"],
        _ => &[]
    }
}

/// Strips the assignment line and parses the remaining JSON object.
pub fn parse_results(contents: &str) -> InventoryResult<Map<String, Value>> {
    let (_, body) = contents
        .split_once('\n')
        .ok_or_else(|| InventoryError::ScanReport("results file has no body".to_string()))?;

    match serde_json::from_str(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(InventoryError::ScanReport(
            "results body is not a JSON object".to_string()
        ))
    }
}

/// Events keyed by id; a repeated id replaces the earlier event in place.
#[derive(Default)]
struct EventSet {
    events: Vec<Event>,
    index: HashMap<String, usize>
}

impl EventSet {
    fn insert(&mut self, scope: &str, event: Event) {
        let id = event
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match self.index.get(&id) {
            Some(&position) => {
                warn!(
                    scope,
                    id = %id,
                    orig_type = ?self.events[position].get("type"),
                    "Event already exists"
                );
                self.events[position] = event;
            }
            None => {
                self.index.insert(id, self.events.len());
                self.events.push(event);
            }
        }
    }
}

pub struct ReportFlattener {
    timestamp: String
}

impl ReportFlattener {
    pub fn new<Tz: TimeZone>(generated_at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display
    {
        Self {
            timestamp: generated_at.format("%F %T%z").to_string()
        }
    }

    pub fn flatten(&self, results: &Map<String, Value>) -> Vec<Event> {
        let mut template = Event::new();
        let mut sections = Vec::new();

        for (key, value) in results {
            match value {
                Value::Object(_) | Value::Array(_) => sections.push((key, value)),
                _ => match key.as_str() {
                    "account_id" => {
                        template.insert("aws_account_id".to_string(), value.clone());
                    }
                    "result_format" => {}
                    _ => {
                        template.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        let mut events = Vec::new();
        for (key, value) in sections {
            match (key.as_str(), value) {
                ("service_list", _) => {}
                ("last_run", Value::Object(last_run)) => {
                    let mut event = last_run.clone();
                    event.insert("_time".to_string(), self.timestamp.clone().into());
                    event.insert("type".to_string(), key.clone().into());
                    event.insert("id".to_string(), format!("{key}:summary").into());
                    events.push(event);
                }
                ("services", Value::Object(services)) => {
                    for (service_name, service) in services {
                        match service {
                            Value::Object(service) => {
                                events.extend(self.service_events(
                                    service_name,
                                    &template,
                                    service
                                ));
                            }
                            _ => warn!(
                                service = %service_name,
                                "Service section is not an object, skipping"
                            )
                        }
                    }
                }
                (_, Value::Object(section)) => {
                    let mut set = EventSet::default();
                    for (ev_key, ev_value) in section {
                        let Value::Object(body) = ev_value else {
                            warn!(
                                section = %key,
                                target = %ev_key,
                                "Section entry is not an object, skipping"
                            );
                            continue;
                        };
                        let mut event = self.base_event(key);
                        event.insert("id".to_string(), format!("{key}:{ev_key}").into());
                        extend(&mut event, &template);
                        extend(&mut event, body);
                        set.insert(key, event);
                    }
                    events.extend(set.events);
                }
                _ => warn!(section = %key, "Section is not an object, skipping")
            }
        }

        events
    }

    fn base_event(&self, event_type: &str) -> Event {
        let mut event = Event::new();
        event.insert("_time".to_string(), self.timestamp.clone().into());
        event.insert("type".to_string(), event_type.into());
        event
    }

    fn service_events(&self, service_name: &str, template: &Event, service: &Event) -> Vec<Event> {
        let typed = |event_type: &str| {
            let mut event = template.clone();
            event.insert("_time".to_string(), self.timestamp.clone().into());
            event.insert("service".to_string(), service_name.into());
            event.insert("type".to_string(), event_type.into());
            event
        };
        let known = inventory_fields(service_name);

        let mut summary = typed("summary");
        summary.insert("id".to_string(), format!("{service_name}:summary").into());

        let mut filters = Vec::new();
        let mut findings = Vec::new();
        let mut external = Vec::new();
        let mut inventory = Vec::new();

        for (key, value) in service {
            debug!(service = service_name, key = %key, "Processing service key");
            let Value::Object(entries) = value else {
                summary.insert(key.clone(), value.clone());
                continue;
            };

            match key.as_str() {
                "filters" | "findings" | "external_attack_surface" => {
                    let category = match key.as_str() {
                        "filters" => &mut filters,
                        "findings" => &mut findings,
                        _ => &mut external
                    };
                    for (name, body) in entries {
                        let mut event = Event::new();
                        event.insert("id".to_string(), format!("{key}:{name}").into());
                        extend(&mut event, &typed(key.as_str()));
                        if let Value::Object(body) = body {
                            extend(&mut event, body);
                        }
                        category.push(event);
                    }
                }
                "regions" => {
                    for (region, region_data) in entries {
                        let Value::Object(region_data) = region_data else {
                            continue;
                        };
                        self.region_events(
                            service_name,
                            region,
                            region_data,
                            &typed("inventory"),
                            &mut inventory
                        );
                    }
                }
                _ if known.contains(&key.as_str()) => {
                    let items = if key == "permissions" {
                        entries.get("Action").and_then(Value::as_object)
                    } else {
                        Some(entries)
                    };
                    for (name, body) in items.into_iter().flatten() {
                        let mut event = Event::new();
                        event.insert("id".to_string(), format!("{key}:{name}").into());
                        event.insert("sub_type".to_string(), key.clone().into());
                        extend(&mut event, &typed("inventory"));
                        match body {
                            Value::Object(body) => extend(&mut event, body),
                            other => debug!(
                                service = service_name,
                                key = %name,
                                kind = ?other,
                                "Inventory item is not an object"
                            )
                        }
                        inventory.push(event);
                    }
                }
                _ => debug!(service = service_name, key = %key, "Unknown service key")
            }
        }

        // One id space per service; a later event replaces an earlier one.
        let mut set = EventSet::default();
        set.insert(service_name, summary);
        for event in filters
            .into_iter()
            .chain(findings)
            .chain(external)
            .chain(inventory)
        {
            set.insert(service_name, event);
        }
        set.events
    }

    fn region_events(
        &self,
        service_name: &str,
        region: &str,
        region_data: &Event,
        inventory_template: &Event,
        inventory: &mut Vec<Event>
    ) {
        let known = inventory_fields(service_name);
        let region_id = format!("summary:{service_name}:{region}");

        let mut region_summary = Event::new();
        region_summary.insert("sub_type".to_string(), "summary".into());
        region_summary.insert("id".to_string(), region_id.into());
        region_summary.insert("region".to_string(), region.into());
        extend(&mut region_summary, inventory_template);

        let mut resources = Vec::new();
        for (rkey, rvalue) in region_data {
            match rvalue {
                Value::Object(items) if known.contains(&rkey.as_str()) => {
                    for (name, body) in items {
                        let mut event = Event::new();
                        event.insert(
                            "id".to_string(),
                            format!("{service_name}:{region}:{rkey}:{name}").into()
                        );
                        event.insert("region".to_string(), region.into());
                        event.insert("sub_type".to_string(), rkey.clone().into());
                        extend(&mut event, inventory_template);
                        if let Value::Object(body) = body {
                            extend(&mut event, body);
                        }
                        resources.push(event);
                    }
                }
                _ => {
                    region_summary.insert(rkey.clone(), rvalue.clone());
                }
            }
        }

        inventory.push(region_summary);
        inventory.extend(resources);
    }
}

fn extend(target: &mut Event, source: &Event) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

/// Reads `source`, flattens it and writes newline-delimited events to
/// `destination`. Returns the number of events written.
pub fn flatten_file(source: &Path, destination: &Path) -> InventoryResult<usize> {
    let contents = std::fs::read_to_string(source)?;
    let results = parse_results(&contents)?;

    let flattener = ReportFlattener::new(&chrono::Local::now());
    let events = flattener.flatten(&results);

    let writer = BufWriter::new(File::create(destination)?);
    write_json_lines(events.iter(), writer)?;

    info!(
        source = %source.display(),
        destination = %destination.display(),
        events = events.len(),
        "Flattened scan report"
    );
    Ok(events.len())
}
