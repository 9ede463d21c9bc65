// ABOUTME: Expands one job definition into its flat list of comparison tasks
// ABOUTME: Cross product of endpoints (or endpoint pairs) x ID substitutions x geo variants

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use super::template::build_url;
use crate::config::{find_endpoint, EndpointDef, Headers, HeaderTemplate, IdCatalog, JobSpec};

pub const PAIR_SEPARATOR: &str = "__VS__";

/// One (endpoint, substitution, geo) unit of work. Never mutated after expansion.
#[derive(Debug, Clone)]
pub struct ComparisonTask {
    pub key: String,
    pub params: BTreeMap<String, String>,
    pub geo: Option<String>,
    pub url_a: String,
    pub url_b: String,
    pub template: Arc<HeaderTemplate>,
}

impl ComparisonTask {
    pub fn headers(&self) -> Headers {
        self.template.headers_for(self.geo.as_deref())
    }
}

#[derive(Debug, Default)]
pub struct Expansion {
    pub tasks: Vec<ComparisonTask>,
    /// Selectors or pairs that named an endpoint missing for the job's platform.
    pub unresolved: Vec<String>,
}

struct Unit<'a> {
    key: String,
    path_a: &'a str,
    path_b: &'a str,
    category: Option<&'a str>,
}

/// Builds the task list for `job`. Ordering is endpoint/pair, then substitution, then geo.
pub fn expand_job(
    job: &JobSpec,
    template: Arc<HeaderTemplate>,
    ids: &IdCatalog,
    endpoints: &[EndpointDef],
    quick: bool,
) -> Expansion {
    let mut expansion = Expansion::default();
    let units = resolve_units(job, endpoints, &mut expansion.unresolved);

    let mut geos = template.geo_variants();
    if quick {
        geos.truncate(1);
    }

    for unit in units {
        let mut substitutions: Vec<BTreeMap<String, String>> = match unit.category {
            Some(category) => ids
                .get(category)
                .map(|list| {
                    list.iter()
                        .map(|id| BTreeMap::from([(category.to_string(), id.to_string())]))
                        .collect()
                })
                .unwrap_or_default(),
            None => vec![BTreeMap::new()],
        };
        if quick {
            substitutions.truncate(1);
        }

        for params in &substitutions {
            let url_a = build_url(&job.base_a, &job.platform, unit.path_a, params);
            let url_b = build_url(&job.base_b, &job.platform, unit.path_b, params);
            for geo in &geos {
                expansion.tasks.push(ComparisonTask {
                    key: unit.key.clone(),
                    params: params.clone(),
                    geo: geo.clone(),
                    url_a: url_a.clone(),
                    url_b: url_b.clone(),
                    template: Arc::clone(&template),
                });
            }
        }
    }

    expansion
}

fn resolve_units<'a>(
    job: &'a JobSpec,
    endpoints: &'a [EndpointDef],
    unresolved: &mut Vec<String>,
) -> Vec<Unit<'a>> {
    let category_of = |ep: &'a EndpointDef| -> Option<&'a str> {
        job.id_categories
            .get(&ep.key)
            .or(ep.id_category.as_ref())
            .map(String::as_str)
    };

    if !job.endpoint_pairs.is_empty() {
        let mut units = Vec::new();
        for pair in &job.endpoint_pairs {
            let key = format!("{}{}{}", pair.a, PAIR_SEPARATOR, pair.b);
            let a = find_endpoint(endpoints, &job.platform, &pair.a);
            let b = find_endpoint(endpoints, &job.platform, &pair.b);
            match (a, b) {
                (Some(a), Some(b)) => units.push(Unit {
                    key,
                    path_a: &a.path,
                    path_b: &b.path,
                    category: category_of(a).or_else(|| category_of(b)),
                }),
                _ => {
                    warn!(
                        "Job '{}': dropping pair {} (endpoint not found for platform '{}')",
                        job.name, key, job.platform
                    );
                    unresolved.push(key);
                }
            }
        }
        return units;
    }

    for selector in &job.endpoints_to_run {
        if find_endpoint(endpoints, &job.platform, selector).is_none() {
            warn!(
                "Job '{}': endpoint '{}' not found for platform '{}'",
                job.name, selector, job.platform
            );
            unresolved.push(selector.clone());
        }
    }

    endpoints
        .iter()
        .filter(|ep| ep.platform == job.platform)
        .filter(|ep| job.endpoints_to_run.is_empty() || job.endpoints_to_run.contains(&ep.key))
        .map(|ep| Unit {
            key: ep.key.clone(),
            path_a: &ep.path,
            path_b: &ep.path,
            category: category_of(ep),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointPair, HeaderValue, IdValue, RetryPolicy};

    fn endpoint(platform: &str, key: &str, path: &str, category: Option<&str>) -> EndpointDef {
        EndpointDef {
            platform: platform.into(),
            key: key.into(),
            path: path.into(),
            id_category: category.map(str::to_string),
        }
    }

    fn catalog() -> Vec<EndpointDef> {
        vec![
            endpoint("a", "score", "teams/{teamId}/score", Some("teamId")),
            endpoint("a", "home", "home", None),
            endpoint("a", "player", "players/{playerId}", Some("playerId")),
            endpoint("i", "score", "teams/{teamId}/score", Some("teamId")),
        ]
    }

    fn ids() -> IdCatalog {
        IdCatalog::from([
            (
                "teamId".to_string(),
                vec![IdValue::Int(42), IdValue::Int(7), IdValue::Int(9)],
            ),
            ("playerId".to_string(), vec![IdValue::Text("p-1".into())]),
        ])
    }

    fn template(geos: &[&str]) -> Arc<HeaderTemplate> {
        let mut values = BTreeMap::new();
        values.insert("accept".to_string(), HeaderValue::One("application/json".into()));
        values.insert(
            "cb-loc".to_string(),
            HeaderValue::Many(geos.iter().map(|g| g.to_string()).collect()),
        );
        Arc::new(HeaderTemplate {
            geo_header: "cb-loc".into(),
            values,
        })
    }

    fn job() -> JobSpec {
        JobSpec {
            name: "prod-vs-staging".into(),
            platform: "a".into(),
            base_a: "https://prod".into(),
            base_b: "https://staging".into(),
            endpoints_to_run: Vec::new(),
            endpoint_pairs: Vec::new(),
            id_categories: BTreeMap::new(),
            retry_policy: Some(RetryPolicy {
                retries: 1,
                delay_ms: 1,
            }),
            ignore_paths: Vec::new(),
            quick_mode: false,
            test_engineer: None,
        }
    }

    #[test]
    fn test_full_cross_product() {
        let expansion = expand_job(&job(), template(&["IN", "US"]), &ids(), &catalog(), false);
        // score: 3 ids x 2 geos, home: 1 x 2, player: 1 x 2
        assert_eq!(expansion.tasks.len(), 10);
        assert!(expansion.unresolved.is_empty());

        let first = &expansion.tasks[0];
        assert_eq!(first.key, "score");
        assert_eq!(first.params["teamId"], "42");
        assert_eq!(first.geo.as_deref(), Some("IN"));
        assert_eq!(first.url_a, "https://prod/a/teams/42/score");
        assert_eq!(first.url_b, "https://staging/a/teams/42/score");
        assert_eq!(first.headers()["cb-loc"], "IN");
        assert_eq!(expansion.tasks[1].geo.as_deref(), Some("US"));
    }

    #[test]
    fn test_quick_mode_keeps_first_id_and_geo() {
        let expansion = expand_job(&job(), template(&["IN", "US", "GB"]), &ids(), &catalog(), true);
        assert_eq!(expansion.tasks.len(), 3);
        for task in &expansion.tasks {
            assert_eq!(task.geo.as_deref(), Some("IN"));
        }
        assert_eq!(expansion.tasks[0].params["teamId"], "42");
    }

    #[test]
    fn test_selectors_filter_endpoints() {
        let mut job = job();
        job.endpoints_to_run = vec!["home".into()];
        let expansion = expand_job(&job, template(&["IN"]), &ids(), &catalog(), false);
        assert_eq!(expansion.tasks.len(), 1);
        assert!(expansion.tasks[0].params.is_empty());
        assert_eq!(expansion.tasks[0].url_a, "https://prod/a/home");
    }

    #[test]
    fn test_unknown_selector_yields_no_tasks() {
        let mut job = job();
        job.endpoints_to_run = vec!["x".into()];
        let expansion = expand_job(&job, template(&["IN"]), &ids(), &catalog(), false);
        assert!(expansion.tasks.is_empty());
        assert_eq!(expansion.unresolved, vec!["x".to_string()]);
    }

    #[test]
    fn test_pairs_resolve_each_side() {
        let mut job = job();
        job.endpoint_pairs = vec![EndpointPair {
            a: "score".into(),
            b: "player".into(),
        }];
        let expansion = expand_job(&job, template(&["IN"]), &ids(), &catalog(), false);
        assert_eq!(expansion.tasks.len(), 3);
        let task = &expansion.tasks[0];
        assert_eq!(task.key, "score__VS__player");
        assert_eq!(task.url_a, "https://prod/a/teams/42/score");
        // side A's category wins, so side B's own placeholder stays unfilled
        assert_eq!(task.url_b, "https://staging/a/players/{playerId}");
    }

    #[test]
    fn test_pair_falls_back_to_side_b_category() {
        let mut job = job();
        job.endpoint_pairs = vec![EndpointPair {
            a: "home".into(),
            b: "player".into(),
        }];
        let expansion = expand_job(&job, template(&["IN"]), &ids(), &catalog(), false);
        assert_eq!(expansion.tasks.len(), 1);
        assert_eq!(expansion.tasks[0].url_b, "https://staging/a/players/p-1");
    }

    #[test]
    fn test_unresolvable_pair_dropped() {
        let mut job = job();
        job.endpoint_pairs = vec![
            EndpointPair {
                a: "home".into(),
                b: "missing".into(),
            },
            EndpointPair {
                a: "home".into(),
                b: "home".into(),
            },
        ];
        let expansion = expand_job(&job, template(&["IN"]), &ids(), &catalog(), false);
        assert_eq!(expansion.tasks.len(), 1);
        assert_eq!(expansion.unresolved, vec!["home__VS__missing".to_string()]);
    }

    #[test]
    fn test_job_category_override() {
        let mut job = job();
        job.endpoints_to_run = vec!["home".into()];
        job.id_categories.insert("home".into(), "teamId".into());
        let expansion = expand_job(&job, template(&["IN"]), &ids(), &catalog(), false);
        assert_eq!(expansion.tasks.len(), 3);
    }

    #[test]
    fn test_category_without_ids_yields_no_tasks() {
        let expansion = expand_job(&job(), template(&["IN"]), &IdCatalog::new(), &catalog(), false);
        // only "home" has no category
        assert_eq!(expansion.tasks.len(), 1);
        assert_eq!(expansion.tasks[0].key, "home");
    }

    #[test]
    fn test_expansion_is_stable() {
        let keys = |e: Expansion| {
            e.tasks
                .into_iter()
                .map(|t| format!("{}|{:?}|{:?}", t.key, t.params, t.geo))
                .collect::<Vec<_>>()
        };
        let first = keys(expand_job(&job(), template(&["IN", "US"]), &ids(), &catalog(), false));
        let second = keys(expand_job(&job(), template(&["IN", "US"]), &ids(), &catalog(), false));
        assert_eq!(first, second);
    }
}
