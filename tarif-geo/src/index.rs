use std::collections::HashMap;

use tarif_core::{PricingError, PricingResult};
use uuid::Uuid;

use crate::zone::{GeoZone, GeoZoneMapping};

/// Hard ceiling on zone-tree depth. The levels only name four rungs but the
/// tree is not required to be full, so the bound is generous.
const MAX_ZONE_DEPTH: usize = 16;

/// In-memory zone index. Ancestor chains are precomputed at build time so a
/// resolution walk is a single map lookup instead of repeated store reads.
pub struct ZoneIndex {
    zones: HashMap<Uuid, GeoZone>,
    // leaf-to-root zone ids, inclusive of the key itself
    ancestors: HashMap<Uuid, Vec<Uuid>>,
    mappings: Vec<GeoZoneMapping>,
}

impl ZoneIndex {
    /// Build the index from a snapshot. Fails with `Config` on a parent
    /// cycle or a dangling parent reference; these indicate corrupted data
    /// that write-time validation should have rejected.
    pub fn build(zones: Vec<GeoZone>, mappings: Vec<GeoZoneMapping>) -> PricingResult<Self> {
        let by_id: HashMap<Uuid, GeoZone> = zones.into_iter().map(|z| (z.id, z)).collect();

        let mut ancestors: HashMap<Uuid, Vec<Uuid>> = HashMap::with_capacity(by_id.len());
        for zone in by_id.values() {
            let mut chain = Vec::new();
            let mut cursor = Some(zone.id);
            while let Some(id) = cursor {
                if chain.contains(&id) {
                    return Err(PricingError::Config(format!(
                        "zone hierarchy cycle through {}",
                        id
                    )));
                }
                if chain.len() >= MAX_ZONE_DEPTH {
                    return Err(PricingError::Config(format!(
                        "zone chain for {} exceeds depth {}",
                        zone.id, MAX_ZONE_DEPTH
                    )));
                }
                let node = by_id.get(&id).ok_or_else(|| {
                    PricingError::Config(format!("zone {} references missing parent {}", zone.id, id))
                })?;
                chain.push(id);
                cursor = node.parent_zone;
            }
            ancestors.insert(zone.id, chain);
        }

        Ok(Self {
            zones: by_id,
            ancestors,
            mappings,
        })
    }

    pub fn get(&self, id: Uuid) -> Option<&GeoZone> {
        self.zones.get(&id)
    }

    /// Leaf-to-root chain for a zone, inclusive. Inactive ancestors stay in
    /// the chain; deactivating a STATE must not orphan its CITYs.
    pub fn ancestors_of(&self, zone_id: Uuid) -> PricingResult<Vec<GeoZone>> {
        let ids = self
            .ancestors
            .get(&zone_id)
            .ok_or_else(|| PricingError::NotFound(format!("zone {}", zone_id)))?;
        Ok(ids.iter().map(|id| self.zones[id].clone()).collect())
    }

    /// Resolve a pincode to its zone chain, leaf to root.
    ///
    /// When mapping ranges overlap, the smallest range wins; ties go to the
    /// most recently created mapping, then lowest id for full determinism.
    /// Mappings onto inactive zones are ignored.
    pub fn resolve_path(&self, pincode: u32) -> PricingResult<Vec<GeoZone>> {
        let winner = self
            .mappings
            .iter()
            .filter(|m| m.contains(pincode))
            .filter(|m| self.zones.get(&m.geo_zone).map(|z| z.is_active).unwrap_or(false))
            .min_by(|a, b| {
                a.span()
                    .cmp(&b.span())
                    .then(b.created_at.cmp(&a.created_at))
                    .then(a.id.cmp(&b.id))
            });

        match winner {
            Some(m) => {
                let chain = self.ancestors_of(m.geo_zone)?;
                tracing::debug!(
                    pincode,
                    zone = %m.geo_zone,
                    depth = chain.len(),
                    "resolved pincode to zone chain"
                );
                Ok(chain)
            }
            None => Err(PricingError::NotFound(format!(
                "no zone mapping covers pincode {}",
                pincode
            ))),
        }
    }

    /// True when `candidate` is `zone` itself or one of its ancestors.
    pub fn is_self_or_ancestor(&self, zone: Uuid, candidate: Uuid) -> bool {
        self.ancestors
            .get(&zone)
            .map(|chain| chain.contains(&candidate))
            .unwrap_or(false)
    }
}

/// Write-time guard: would pointing `zone_id` at `new_parent` create a cycle
/// or overflow the depth bound? Called before a parent assignment commits.
pub fn validate_zone_parent(
    zones: &[GeoZone],
    zone_id: Uuid,
    new_parent: Option<Uuid>,
) -> PricingResult<()> {
    let by_id: HashMap<Uuid, &GeoZone> = zones.iter().map(|z| (z.id, z)).collect();
    let mut cursor = new_parent;
    let mut depth = 0usize;
    while let Some(id) = cursor {
        if id == zone_id {
            return Err(PricingError::Validation(format!(
                "parent assignment would create a cycle through zone {}",
                zone_id
            )));
        }
        depth += 1;
        if depth >= MAX_ZONE_DEPTH {
            return Err(PricingError::Validation(format!(
                "parent chain exceeds depth {}",
                MAX_ZONE_DEPTH
            )));
        }
        cursor = by_id
            .get(&id)
            .ok_or_else(|| PricingError::Validation(format!("unknown parent zone {}", id)))?
            .parent_zone;
    }
    Ok(())
}

/// Write-time guard for mappings: inverted ranges and exact duplicates for
/// the same zone are rejected.
pub fn validate_mapping(
    existing: &[GeoZoneMapping],
    mapping: &GeoZoneMapping,
) -> PricingResult<()> {
    if mapping.pincode_start > mapping.pincode_end {
        return Err(PricingError::Validation(format!(
            "mapping range inverted: {} > {}",
            mapping.pincode_start, mapping.pincode_end
        )));
    }
    let duplicate = existing.iter().any(|m| {
        m.geo_zone == mapping.geo_zone
            && m.pincode_start == mapping.pincode_start
            && m.pincode_end == mapping.pincode_end
            && m.id != mapping.id
    });
    if duplicate {
        return Err(PricingError::Validation(format!(
            "duplicate mapping {}..{} for zone {}",
            mapping.pincode_start, mapping.pincode_end, mapping.geo_zone
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::ZoneLevel;
    use chrono::{Duration, Utc};

    fn us_tree() -> (Vec<GeoZone>, GeoZone, GeoZone, GeoZone) {
        let us = GeoZone::new("United States", "US", ZoneLevel::Country, None);
        let ny = GeoZone::new("New York", "NY", ZoneLevel::State, Some(us.id));
        let nyc = GeoZone::new("New York City", "NYC", ZoneLevel::City, Some(ny.id));
        let zones = vec![us.clone(), ny.clone(), nyc.clone()];
        (zones, us, ny, nyc)
    }

    #[test]
    fn resolves_pincode_to_leaf_to_root_chain() {
        let (mut zones, us, ny, nyc) = us_tree();
        let zip = GeoZone::new("10001", "10001", ZoneLevel::Zip, Some(nyc.id));
        zones.push(zip.clone());
        let mappings = vec![GeoZoneMapping::new(zip.id, 10001, 10001)];

        let index = ZoneIndex::build(zones, mappings).unwrap();
        let chain = index.resolve_path(10001).unwrap();

        let codes: Vec<&str> = chain.iter().map(|z| z.code.as_str()).collect();
        assert_eq!(codes, vec!["10001", "NYC", "NY", "US"]);
        assert_eq!(chain[0].level, ZoneLevel::Zip);
        assert_eq!(chain.last().unwrap().id, us.id);
        assert_eq!(chain[2].id, ny.id);
    }

    #[test]
    fn unmapped_pincode_is_not_found() {
        let (zones, _, _, nyc) = us_tree();
        let mappings = vec![GeoZoneMapping::new(nyc.id, 10000, 10099)];
        let index = ZoneIndex::build(zones, mappings).unwrap();

        assert!(matches!(
            index.resolve_path(99999),
            Err(PricingError::NotFound(_))
        ));
    }

    #[test]
    fn smallest_overlapping_range_wins() {
        let (zones, _, ny, nyc) = us_tree();
        let wide = GeoZoneMapping::new(ny.id, 10000, 14999);
        let narrow = GeoZoneMapping::new(nyc.id, 10000, 10299);
        let index = ZoneIndex::build(zones, vec![wide, narrow]).unwrap();

        let chain = index.resolve_path(10001).unwrap();
        assert_eq!(chain[0].id, nyc.id);
    }

    #[test]
    fn equal_span_tie_goes_to_newest_mapping() {
        let (zones, _, ny, nyc) = us_tree();
        let mut older = GeoZoneMapping::new(ny.id, 10000, 10099);
        older.created_at = Utc::now() - Duration::days(30);
        let newer = GeoZoneMapping::new(nyc.id, 10000, 10099);
        let index = ZoneIndex::build(zones, vec![older, newer]).unwrap();

        let chain = index.resolve_path(10050).unwrap();
        assert_eq!(chain[0].id, nyc.id);
    }

    #[test]
    fn inactive_zone_mapping_is_ignored_but_chain_keeps_inactive_ancestors() {
        let (mut zones, _, ny, nyc) = us_tree();
        // deactivate NYC: its mapping stops matching
        zones.iter_mut().find(|z| z.id == nyc.id).unwrap().is_active = false;
        let mappings = vec![
            GeoZoneMapping::new(nyc.id, 10000, 10099),
            GeoZoneMapping::new(ny.id, 10000, 14999),
        ];
        let index = ZoneIndex::build(zones.clone(), mappings).unwrap();
        let chain = index.resolve_path(10050).unwrap();
        assert_eq!(chain[0].id, ny.id);

        // an inactive mid-level zone still appears in its child's chain
        let mut zones2 = zones;
        zones2.iter_mut().find(|z| z.id == ny.id).unwrap().is_active = false;
        let index2 = ZoneIndex::build(zones2, vec![]).unwrap();
        let codes: Vec<String> = index2
            .ancestors_of(nyc.id)
            .unwrap()
            .iter()
            .map(|z| z.code.clone())
            .collect();
        assert_eq!(codes, vec!["NYC", "NY", "US"]);
    }

    #[test]
    fn build_rejects_parent_cycle() {
        let mut a = GeoZone::new("A", "A", ZoneLevel::State, None);
        let b = GeoZone::new("B", "B", ZoneLevel::City, Some(a.id));
        a.parent_zone = Some(b.id);

        assert!(matches!(
            ZoneIndex::build(vec![a, b], vec![]),
            Err(PricingError::Config(_))
        ));
    }

    #[test]
    fn parent_validation_rejects_cycle_before_write() {
        let (zones, us, _, nyc) = us_tree();
        // US -> NYC would close the loop US -> NYC -> NY -> US
        let err = validate_zone_parent(&zones, us.id, Some(nyc.id));
        assert!(matches!(err, Err(PricingError::Validation(_))));

        // and a fresh leaf under NYC is fine
        assert!(validate_zone_parent(&zones, Uuid::new_v4(), Some(nyc.id)).is_ok());
    }

    #[test]
    fn mapping_validation_rejects_inverted_and_duplicate_ranges() {
        let (_, _, _, nyc) = us_tree();
        let existing = vec![GeoZoneMapping::new(nyc.id, 10000, 10099)];

        let inverted = GeoZoneMapping::new(nyc.id, 500, 100);
        assert!(validate_mapping(&existing, &inverted).is_err());

        let duplicate = GeoZoneMapping::new(nyc.id, 10000, 10099);
        assert!(validate_mapping(&existing, &duplicate).is_err());

        // same range on a different zone is allowed
        let other_zone = GeoZoneMapping::new(Uuid::new_v4(), 10000, 10099);
        assert!(validate_mapping(&existing, &other_zone).is_ok());
    }

    #[test]
    fn is_self_or_ancestor_walks_the_chain() {
        let (zones, us, ny, nyc) = us_tree();
        let index = ZoneIndex::build(zones, vec![]).unwrap();

        assert!(index.is_self_or_ancestor(nyc.id, nyc.id));
        assert!(index.is_self_or_ancestor(nyc.id, ny.id));
        assert!(index.is_self_or_ancestor(nyc.id, us.id));
        assert!(!index.is_self_or_ancestor(us.id, nyc.id));
    }
}
