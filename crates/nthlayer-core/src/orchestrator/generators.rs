//! Artifact generators. Each is a pure function of the resource index plus
//! the external data bundle, invoked in a fixed order so plan output is
//! byte-stable.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::dashboard::DashboardGenerator;
use crate::domain::{
    Artifact, ArtifactKind, OwnershipAttribution, ResolvedDependency, ServiceSpec, ServiceType,
    Technology,
};
use crate::error::GeneratorError;

use super::detector::{Resource, ResourceIndex, ResourceKind};

/// External data generators are allowed to read, gathered once by the
/// caller before generation starts.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    /// Metric families discovered for the service.
    pub discovered_metrics: BTreeSet<String>,
    /// Merged dependencies from the discovery orchestrator.
    pub dependencies: Vec<ResolvedDependency>,
    /// Resolved ownership, when available.
    pub ownership: Option<OwnershipAttribution>,
    /// Previously applied content hashes, keyed by artifact kind.
    pub baseline_hashes: BTreeMap<ArtifactKind, String>,
}

/// One generator outcome: the artifact and its human diff summary.
pub(super) type GeneratorOutcome = Result<(Artifact, String), GeneratorError>;

/// Run every applicable generator in fixed order (recording rules, alerts,
/// dashboards, SLO record, directory entry).
pub(super) fn generate_all(
    index: &ResourceIndex,
    ctx: &GenerationContext,
) -> Vec<(ArtifactKind, GeneratorOutcome)> {
    let mut outcomes = Vec::new();
    if index.has(ResourceKind::RecordingRules) {
        outcomes.push((ArtifactKind::RecordingRules, recording_rules(index)));
    }
    if index.has(ResourceKind::AlertRules) {
        outcomes.push((ArtifactKind::AlertRules, alert_rules(index, ctx)));
    }
    if index.has(ResourceKind::Dashboard) {
        outcomes.push((ArtifactKind::Dashboard, dashboard(index, ctx)));
    }
    if index.has(ResourceKind::Slo) {
        outcomes.push((ArtifactKind::SloRecord, slo_record(index)));
    }
    if index.has(ResourceKind::DirectoryEntry) {
        outcomes.push((ArtifactKind::DirectoryEntry, directory_entry(index, ctx)));
    }
    outcomes
}

// Prometheus rule-file shapes. Field order here is file order.

#[derive(Serialize)]
struct RuleFile {
    groups: Vec<RuleGroup>,
}

#[derive(Serialize)]
struct RuleGroup {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<String>,
    rules: Vec<Rule>,
}

#[derive(Serialize)]
struct Rule {
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<String>,
    expr: String,
    #[serde(rename = "for", skip_serializing_if = "Option::is_none")]
    for_: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

fn slo_labels(index: &ResourceIndex, slo: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("service".to_string(), index.service.clone()),
        ("slo".to_string(), slo.to_string()),
        ("tier".to_string(), index.tier.as_str().to_string()),
    ])
}

/// Default SLI for request-serving workloads: HTTP success ratio.
fn default_sli_expr(index: &ResourceIndex) -> Option<String> {
    match index.service_type {
        ServiceType::Api | ServiceType::Frontend => Some(format!(
            "sum(rate(http_requests_total{{service=\"{service}\",code!~\"5..\"}}[5m])) \
             / sum(rate(http_requests_total{{service=\"{service}\"}}[5m]))",
            service = index.service
        )),
        _ => None,
    }
}

fn recording_rules(index: &ResourceIndex) -> GeneratorOutcome {
    let mut groups = Vec::new();
    let mut rule_count = 0;

    for resource in index.get(ResourceKind::RecordingRules) {
        let Resource::RecordingRuleRequest(slo) = resource else {
            continue;
        };
        let sli_expr = slo
            .sli_expr
            .clone()
            .or_else(|| default_sli_expr(index))
            .ok_or_else(|| GeneratorError::MissingData {
                kind: ArtifactKind::RecordingRules.as_str().to_string(),
                service: index.service.clone(),
                what: format!("sli_expr for SLO {:?} on a non-HTTP workload", slo.name),
            })?;

        let budget_expr = format!(
            "clamp_min(1 - ((1 - avg_over_time(slo:sli_ratio:rate5m{{service=\"{service}\",\
             slo=\"{slo}\"}}[{window}])) / (1 - {objective})), 0)",
            service = index.service,
            slo = slo.name,
            window = slo.window,
            objective = slo.objective,
        );

        groups.push(RuleGroup {
            name: format!("{}-{}-recording", index.service, slo.name),
            interval: Some("1m".to_string()),
            rules: vec![
                Rule {
                    record: Some("slo:sli_ratio:rate5m".to_string()),
                    alert: None,
                    expr: sli_expr,
                    for_: None,
                    labels: slo_labels(index, &slo.name),
                    annotations: BTreeMap::new(),
                },
                Rule {
                    record: Some("slo:error_budget_remaining:ratio".to_string()),
                    alert: None,
                    expr: budget_expr,
                    for_: None,
                    labels: slo_labels(index, &slo.name),
                    annotations: BTreeMap::new(),
                },
            ],
        });
        rule_count += 2;
    }

    let content = render_yaml(&RuleFile { groups }, ArtifactKind::RecordingRules, index)?;
    let summary = format!("{rule_count} recording rules for {} SLOs", rule_count / 2);
    Ok((
        Artifact {
            kind: ArtifactKind::RecordingRules,
            service: index.service.clone(),
            content,
        },
        summary,
    ))
}

fn alert_rules(index: &ResourceIndex, ctx: &GenerationContext) -> GeneratorOutcome {
    let severity_page = match index.tier {
        crate::domain::Tier::Critical => "page",
        _ => "ticket",
    };
    let mut groups = Vec::new();
    let mut alert_count = 0;

    // Multiwindow burn-rate alerts per SLO.
    for slo in index.slos() {
        let error_budget = 1.0 - slo.objective;
        let selector = format!(
            "{{service=\"{}\",slo=\"{}\"}}",
            index.service, slo.name
        );
        let rules = vec![
            Rule {
                record: None,
                alert: Some("ErrorBudgetFastBurn".to_string()),
                expr: format!(
                    "(1 - slo:sli_ratio:rate5m{selector}) > {:.6}",
                    14.4 * error_budget
                ),
                for_: Some("5m".to_string()),
                labels: {
                    let mut labels = slo_labels(index, &slo.name);
                    labels.insert("severity".to_string(), severity_page.to_string());
                    labels
                },
                annotations: BTreeMap::from([(
                    "summary".to_string(),
                    format!(
                        "{} is burning its {} error budget at >14.4x",
                        index.service, slo.name
                    ),
                )]),
            },
            Rule {
                record: None,
                alert: Some("ErrorBudgetSlowBurn".to_string()),
                expr: format!(
                    "(1 - avg_over_time(slo:sli_ratio:rate5m{selector}[6h])) > {:.6}",
                    6.0 * error_budget
                ),
                for_: Some("30m".to_string()),
                labels: {
                    let mut labels = slo_labels(index, &slo.name);
                    labels.insert("severity".to_string(), "ticket".to_string());
                    labels
                },
                annotations: BTreeMap::from([(
                    "summary".to_string(),
                    format!(
                        "{} is burning its {} error budget at >6x over 6h",
                        index.service, slo.name
                    ),
                )]),
            },
        ];
        alert_count += rules.len();
        groups.push(RuleGroup {
            name: format!("{}-{}-burn", index.service, slo.name),
            interval: None,
            rules,
        });
    }

    // Dependency health alerts, only for metrics that actually exist.
    let mut dep_rules = Vec::new();
    for resource in index.get(ResourceKind::AlertRules) {
        let Resource::AlertRuleRequest(families) = resource else {
            continue;
        };
        for family in families {
            if let Some(rule) = dependency_alert(index, *family, &ctx.discovered_metrics) {
                dep_rules.push(rule);
            }
        }
    }
    if !dep_rules.is_empty() {
        alert_count += dep_rules.len();
        groups.push(RuleGroup {
            name: format!("{}-dependencies", index.service),
            interval: None,
            rules: dep_rules,
        });
    }

    let content = render_yaml(&RuleFile { groups }, ArtifactKind::AlertRules, index)?;
    Ok((
        Artifact {
            kind: ArtifactKind::AlertRules,
            service: index.service.clone(),
            content,
        },
        format!("{alert_count} alert rules"),
    ))
}

/// Down/backlog alert for one dependency family, when its exporter metric
/// was discovered.
fn dependency_alert(
    index: &ResourceIndex,
    family: Technology,
    discovered: &BTreeSet<String>,
) -> Option<Rule> {
    let service = &index.service;
    let (metric, alert, expr, for_) = match family {
        Technology::Redis => (
            "redis_up",
            "RedisDown",
            format!("redis_up{{service=\"{service}\"}} == 0"),
            "5m",
        ),
        Technology::Postgres => (
            "pg_up",
            "PostgresDown",
            format!("pg_up{{service=\"{service}\"}} == 0"),
            "5m",
        ),
        Technology::Mysql => (
            "mysql_up",
            "MysqlDown",
            format!("mysql_up{{service=\"{service}\"}} == 0"),
            "5m",
        ),
        Technology::Kafka => (
            "kafka_consumergroup_lag",
            "KafkaConsumerLagHigh",
            format!("sum(kafka_consumergroup_lag{{service=\"{service}\"}}) > 10000"),
            "15m",
        ),
        Technology::Rabbitmq => (
            "rabbitmq_queue_messages",
            "RabbitmqQueueBacklog",
            format!("sum(rabbitmq_queue_messages{{service=\"{service}\"}}) > 10000"),
            "15m",
        ),
        _ => return None,
    };
    if !discovered.contains(metric) {
        return None;
    }
    Some(Rule {
        record: None,
        alert: Some(alert.to_string()),
        expr,
        for_: Some(for_.to_string()),
        labels: BTreeMap::from([
            ("service".to_string(), service.clone()),
            ("severity".to_string(), "ticket".to_string()),
        ]),
        annotations: BTreeMap::new(),
    })
}

fn dashboard(index: &ResourceIndex, ctx: &GenerationContext) -> GeneratorOutcome {
    let spec = spec_view(index);
    let dashboard = DashboardGenerator::generate(&spec, &ctx.discovered_metrics);
    let guidance = dashboard.panels.iter().filter(|p| p.expr.is_none()).count();
    let summary = format!("{} panels ({} guidance)", dashboard.panels.len(), guidance);

    let content = serde_json::to_string_pretty(&dashboard).map_err(|e| GeneratorError::Render {
        kind: ArtifactKind::Dashboard.as_str().to_string(),
        service: index.service.clone(),
        message: e.to_string(),
    })?;
    Ok((
        Artifact {
            kind: ArtifactKind::Dashboard,
            service: index.service.clone(),
            content: with_trailing_newline(content),
        },
        summary,
    ))
}

#[derive(Serialize)]
struct SloRecordFile {
    service: String,
    tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    team: Option<String>,
    slos: Vec<SloRecordEntry>,
}

#[derive(Serialize)]
struct SloRecordEntry {
    name: String,
    objective: f64,
    window: String,
}

fn slo_record(index: &ResourceIndex) -> GeneratorOutcome {
    let slos: Vec<SloRecordEntry> = index
        .slos()
        .into_iter()
        .map(|slo| SloRecordEntry {
            name: slo.name.clone(),
            objective: slo.objective,
            window: slo.window.clone(),
        })
        .collect();
    let count = slos.len();
    let file = SloRecordFile {
        service: index.service.clone(),
        tier: index.tier.as_str().to_string(),
        team: index.team.clone(),
        slos,
    };
    let content = render_yaml(&file, ArtifactKind::SloRecord, index)?;
    Ok((
        Artifact {
            kind: ArtifactKind::SloRecord,
            service: index.service.clone(),
            content,
        },
        format!("{count} SLOs registered"),
    ))
}

#[derive(Serialize)]
struct DirectoryFile {
    service: String,
    tier: String,
    #[serde(rename = "type")]
    service_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<DirectoryOwner>,
    dependencies: Vec<DirectoryDependency>,
    slos: Vec<String>,
}

#[derive(Serialize)]
struct DirectoryOwner {
    name: String,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    escalation: Option<String>,
}

#[derive(Serialize)]
struct DirectoryDependency {
    target: String,
    dep_type: String,
    confidence: f64,
    providers: Vec<String>,
}

fn directory_entry(index: &ResourceIndex, ctx: &GenerationContext) -> GeneratorOutcome {
    let mut dependencies: Vec<DirectoryDependency> = ctx
        .dependencies
        .iter()
        .filter(|edge| edge.source == index.service)
        .map(|edge| DirectoryDependency {
            target: edge.target.clone(),
            dep_type: edge.dep_type.as_str().to_string(),
            confidence: edge.confidence,
            providers: edge.providers.iter().cloned().collect(),
        })
        .collect();
    dependencies.sort_by(|a, b| (&a.target, &a.dep_type).cmp(&(&b.target, &b.dep_type)));

    let owner = ctx.ownership.as_ref().map(|attribution| DirectoryOwner {
        name: attribution.owner.clone(),
        confidence: attribution.confidence,
        source: attribution.source.map(|s| s.as_str().to_string()),
        chat: attribution.contacts.chat.clone(),
        email: attribution.contacts.email.clone(),
        escalation: attribution.contacts.escalation.clone(),
    });

    let file = DirectoryFile {
        service: index.service.clone(),
        tier: index.tier.as_str().to_string(),
        service_type: format!("{:?}", index.service_type).to_lowercase(),
        team: index.team.clone(),
        repository: index.repository.clone(),
        owner,
        dependencies,
        slos: index.slos().into_iter().map(|s| s.name.clone()).collect(),
    };

    let dep_count = file.dependencies.len();
    let owner_name = file
        .owner
        .as_ref()
        .map(|o| o.name.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let content = serde_json::to_string_pretty(&file).map_err(|e| GeneratorError::Render {
        kind: ArtifactKind::DirectoryEntry.as_str().to_string(),
        service: index.service.clone(),
        message: e.to_string(),
    })?;
    Ok((
        Artifact {
            kind: ArtifactKind::DirectoryEntry,
            service: index.service.clone(),
            content: with_trailing_newline(content),
        },
        format!("{dep_count} dependencies, owner {owner_name}"),
    ))
}

/// Rebuild a spec view from the index for the dashboard pipeline.
fn spec_view(index: &ResourceIndex) -> ServiceSpec {
    let mut spec = ServiceSpec::new(index.service.clone()).with_tier(index.tier);
    spec.service_type = index.service_type;
    spec.team = index.team.clone();
    spec.repository = index.repository.clone();
    spec.metric_overrides = index.metric_overrides.clone();
    for dep in index.dependencies() {
        spec.dependencies.push(dep.clone());
    }
    spec
}

fn render_yaml<T: Serialize>(
    value: &T,
    kind: ArtifactKind,
    index: &ResourceIndex,
) -> Result<String, GeneratorError> {
    serde_yaml::to_string(value)
        .map(with_trailing_newline)
        .map_err(|e| GeneratorError::Render {
            kind: kind.as_str().to_string(),
            service: index.service.clone(),
            message: e.to_string(),
        })
}

fn with_trailing_newline(mut content: String) -> String {
    if !content.ends_with('\n') {
        content.push('\n');
    }
    content
}
