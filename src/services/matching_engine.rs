//! Evaluates an intent's include/exclude criteria against the annotated
//! container inventory (spec.md §4.3).

use tracing::warn;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AnnotatedContainer, Instance, Intent};
use crate::domain::ports::{ContainerInventoryPort, InstanceRepository};
use crate::services::glob_match::{matches_exclusion, matches_inclusion};

/// A container that passed an intent's matching rules, enriched with the
/// owning instance's base URL as the upgrade executor requires.
#[derive(Debug, Clone)]
pub struct MatchedContainer {
    pub container: AnnotatedContainer,
}

pub struct MatchingEngine<'a> {
    inventory: &'a dyn ContainerInventoryPort,
    instances: &'a dyn InstanceRepository,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(inventory: &'a dyn ContainerInventoryPort, instances: &'a dyn InstanceRepository) -> Self {
        Self { inventory, instances }
    }

    /// `findMatching(intent, userId, requireUpdate)` (spec.md §4.3).
    pub async fn find_matching(&self, intent: &Intent, user_id: i64, require_update: bool) -> DomainResult<Vec<MatchedContainer>> {
        // Defensive: an intent with all inclusion arrays empty is rejected
        // at creation (Intent::validate), but is treated as "match
        // nothing" if one is ever encountered here anyway.
        if !intent.patterns.has_any_inclusion() {
            return Ok(Vec::new());
        }

        let inventory = self.inventory.list_annotated_containers(user_id, require_update).await?;
        let known_instances: Vec<Instance> = self.instances.list_for_user(user_id).await?;

        let mut matched = Vec::new();
        for container in inventory {
            if require_update && !container.has_update {
                continue;
            }

            if !self.passes(intent, &container) {
                continue;
            }

            if !known_instances.iter().any(|i| i.id == container.instance_id) {
                warn!(instance_id = container.instance_id, container_id = %container.container_id, "dropping container with orphan instance reference");
                continue;
            }

            matched.push(MatchedContainer { container });
        }

        Ok(matched)
    }

    fn passes(&self, intent: &Intent, container: &AnnotatedContainer) -> bool {
        let p = &intent.patterns;

        let inclusions = matches_inclusion(&p.match_containers, Some(container.name.as_str()))
            && matches_inclusion(&p.match_images, Some(container.image.as_str()))
            && (p.match_instances.is_empty() || p.match_instances.contains(&container.instance_id))
            && matches_inclusion(&p.match_stacks, container.stack_name.as_deref())
            && matches_inclusion(&p.match_registries, Some(container.registry.as_str()));

        if !inclusions {
            return false;
        }

        // Exclusions are evaluated after all inclusions: exclude wins
        // (spec.md §9 Open Questions, resolved).
        matches_exclusion(&p.exclude_containers, Some(container.name.as_str()))
            && matches_exclusion(&p.exclude_images, Some(container.image.as_str()))
            && matches_exclusion(&p.exclude_stacks, container.stack_name.as_deref())
            && matches_exclusion(&p.exclude_registries, Some(container.registry.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AuthKind, IntentPatterns, ScheduleKind};
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    struct FixedInventory(Vec<AnnotatedContainer>);

    #[async_trait]
    impl ContainerInventoryPort for FixedInventory {
        async fn list_annotated_containers(&self, _user_id: i64, _only_updates: bool) -> DomainResult<Vec<AnnotatedContainer>> {
            Ok(self.0.clone())
        }

        async fn list_unused_images(&self, _user_id: i64) -> DomainResult<Vec<crate::domain::models::UnusedImage>> {
            Ok(vec![])
        }
    }

    struct FixedInstances(Vec<Instance>);

    #[async_trait]
    impl InstanceRepository for FixedInstances {
        async fn list_for_user(&self, _user_id: i64) -> DomainResult<Vec<Instance>> {
            Ok(self.0.clone())
        }
        async fn get(&self, instance_id: i64) -> DomainResult<Option<Instance>> {
            Ok(self.0.iter().find(|i| i.id == instance_id).cloned())
        }
    }

    fn container(name: &str, image: &str, stack: Option<&str>, has_update: bool) -> AnnotatedContainer {
        AnnotatedContainer {
            container_id: format!("c-{name}"),
            instance_id: 1,
            endpoint_id: 1,
            name: name.to_string(),
            stack_name: stack.map(str::to_string),
            image: image.to_string(),
            status: "running".into(),
            state: "running".into(),
            current_digest: None,
            current_digest_full: None,
            registry: "docker.io".into(),
            repo: "acme/widget".into(),
            tag: "1.0.0".into(),
            has_update,
            instance_url: "https://instance-1".into(),
            latest_tag: None,
            latest_digest: None,
        }
    }

    fn intent(patterns: IntentPatterns) -> Intent {
        Intent {
            id: Uuid::new_v4(),
            user_id: 1,
            name: "test".into(),
            description: None,
            enabled: true,
            schedule_kind: ScheduleKind::Immediate,
            schedule_cron: None,
            dry_run: false,
            patterns,
            last_evaluated_at: None,
            last_execution_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn exclude_wins_over_matching_include() {
        let c = container("web-1", "acme/widget:1.0.0", Some("alpha"), true);
        let patterns = IntentPatterns {
            match_images: vec!["acme/*".into()],
            exclude_images: vec!["acme/widget*".into()],
            ..Default::default()
        };
        let intent = intent(patterns);
        let instances = FixedInstances(vec![Instance { id: 1, user_id: 1, name: "i".into(), url: "https://instance-1".into(), auth_kind: AuthKind::Token }]);
        let inventory = FixedInventory(vec![c]);
        let engine = MatchingEngine::new(&inventory, &instances);

        let matched = engine.find_matching(&intent, 1, true).await.unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn drops_orphan_instance_references() {
        let c = container("web-1", "acme/widget:1.0.0", None, true);
        let patterns = IntentPatterns { match_images: vec!["*".into()], ..Default::default() };
        let intent = intent(patterns);
        let instances = FixedInstances(vec![]); // no known instances
        let inventory = FixedInventory(vec![c]);
        let engine = MatchingEngine::new(&inventory, &instances);

        let matched = engine.find_matching(&intent, 1, true).await.unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn require_update_drops_containers_without_update() {
        let c = container("web-1", "acme/widget:1.0.0", None, false);
        let patterns = IntentPatterns { match_images: vec!["*".into()], ..Default::default() };
        let intent = intent(patterns);
        let instances = FixedInstances(vec![Instance { id: 1, user_id: 1, name: "i".into(), url: "https://instance-1".into(), auth_kind: AuthKind::Token }]);
        let inventory = FixedInventory(vec![c]);
        let engine = MatchingEngine::new(&inventory, &instances);

        let matched = engine.find_matching(&intent, 1, true).await.unwrap();
        assert!(matched.is_empty());
    }
}
