use crate::net::WireHit;
use crate::weapon::DamageTypeId;
use crate::world::EntityId;

/// How long a hit record stays eligible for replication after a report.
pub const HIT_RECORD_WINDOW: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitReport {
    pub actual_damage: f32,
    pub instigator: Option<EntityId>,
    pub damage_causer: Option<EntityId>,
    pub damage_type: DamageTypeId,
    pub killed: bool,
}

/// Last damage event taken by a character.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HitRecord {
    pub actual_damage: f32,
    pub instigator: Option<EntityId>,
    pub damage_causer: Option<EntityId>,
    pub damage_type: DamageTypeId,
    pub killed: bool,
    pub timeout: f32,
    /// Bumped on every change; zero means nothing was ever reported.
    pub serial: u32,
}

impl HitRecord {
    pub fn to_wire(&self) -> WireHit {
        WireHit {
            actual_damage: self.actual_damage,
            instigator: self.instigator,
            damage_causer: self.damage_causer,
            damage_type: self.damage_type,
            killed: self.killed,
            serial: self.serial,
        }
    }

    pub fn from_wire(hit: &WireHit) -> Self {
        Self {
            actual_damage: hit.actual_damage,
            instigator: hit.instigator,
            damage_causer: hit.damage_causer,
            damage_type: hit.damage_type,
            killed: hit.killed,
            timeout: 0.0,
            serial: hit.serial,
        }
    }

    fn same_source(&self, report: &HitReport) -> bool {
        self.instigator == report.instigator && self.damage_type == report.damage_type
    }
}

/// Authority side: folds reports into the replicated record.
#[derive(Debug, Clone)]
pub struct HitReplicator {
    record: HitRecord,
    window: f32,
}

impl Default for HitReplicator {
    fn default() -> Self {
        Self::new(HIT_RECORD_WINDOW)
    }
}

impl HitReplicator {
    pub fn new(window: f32) -> Self {
        Self {
            record: HitRecord::default(),
            window,
        }
    }

    pub fn record(&self) -> &HitRecord {
        &self.record
    }

    /// Returns false when the report was a redundant death and got dropped.
    pub fn report(&mut self, report: HitReport, now: f32) -> bool {
        let within_window = self.record.serial != 0 && now < self.record.timeout;

        let mut damage = report.actual_damage;
        if within_window && self.record.same_source(&report) {
            if report.killed && self.record.killed {
                return false;
            }
            damage += self.record.actual_damage;
        }

        self.record = HitRecord {
            actual_damage: damage,
            instigator: report.instigator,
            damage_causer: report.damage_causer,
            damage_type: report.damage_type,
            killed: report.killed,
            timeout: now + self.window,
            serial: self.record.serial.wrapping_add(1).max(1),
        };
        true
    }

    pub fn is_replicating(&self, now: f32) -> bool {
        self.record.serial != 0 && now < self.record.timeout
    }
}

/// Observer side: lets each delivered record through exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitReceiver {
    last_serial: u32,
}

impl HitReceiver {
    pub fn accept(&mut self, hit: &WireHit) -> bool {
        if hit.serial == 0 || hit.serial == self.last_serial {
            return false;
        }
        self.last_serial = hit.serial;
        true
    }

    pub fn last_serial(&self) -> u32 {
        self.last_serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(damage: f32, killed: bool) -> HitReport {
        HitReport {
            actual_damage: damage,
            instigator: Some(7),
            damage_causer: Some(8),
            damage_type: 1,
            killed,
        }
    }

    #[test]
    fn reports_within_window_accumulate() {
        let mut hits = HitReplicator::default();
        assert!(hits.report(bullet(40.0, false), 1.0));
        assert!(hits.report(bullet(40.0, false), 1.2));
        assert_eq!(hits.record().actual_damage, 80.0);
        assert_eq!(hits.record().serial, 2);

        assert!(hits.report(bullet(10.0, false), 2.0));
        assert_eq!(hits.record().actual_damage, 10.0);
    }

    #[test]
    fn different_source_replaces() {
        let mut hits = HitReplicator::default();
        hits.report(bullet(40.0, false), 1.0);
        hits.report(
            HitReport {
                instigator: Some(9),
                ..bullet(25.0, false)
            },
            1.1,
        );
        assert_eq!(hits.record().actual_damage, 25.0);
        assert_eq!(hits.record().instigator, Some(9));
    }

    #[test]
    fn second_death_is_dropped() {
        let mut hits = HitReplicator::default();
        assert!(hits.report(bullet(120.0, true), 1.0));
        assert!(!hits.report(bullet(30.0, true), 1.0));
        assert_eq!(hits.record().actual_damage, 120.0);
        assert_eq!(hits.record().serial, 1);
    }

    #[test]
    fn replication_closes_with_window() {
        let mut hits = HitReplicator::default();
        assert!(!hits.is_replicating(0.0));
        hits.report(bullet(5.0, false), 3.0);
        assert!(hits.is_replicating(3.4));
        assert!(!hits.is_replicating(3.5));
    }

    #[test]
    fn receiver_dedupes_redelivery() {
        let mut hits = HitReplicator::default();
        let mut receiver = HitReceiver::default();
        hits.report(bullet(5.0, false), 0.0);

        let wire = hits.record().to_wire();
        assert!(receiver.accept(&wire));
        assert!(!receiver.accept(&wire));

        hits.report(bullet(5.0, false), 0.1);
        assert!(receiver.accept(&hits.record().to_wire()));
        assert_eq!(HitRecord::from_wire(&hits.record().to_wire()).actual_damage, 10.0);
    }
}
