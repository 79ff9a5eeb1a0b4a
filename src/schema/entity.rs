//! Entity kinds: one variant per durable record set.

use serde::{Deserialize, Serialize};

/// Every table in the LIMS schema. Records of each kind are keyed by a
/// store-assigned UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    UserAccount,
    Analyst,
    Administrator,
    Sop,
    UserSopAction,
    Client,
    Warehouse,
    WarehouseClientLink,
    Location,
    Equipment,
    MaintenanceLog,
    Sample,
    InProcess,
    Stability,
    FinishedProduct,
    UserSampleAction,
    Test,
    SampleTestLink,
    TestEquipmentLink,
    Reagent,
    UserReagentAction,
    TestReagentLink,
    VersionChange,
}

impl EntityKind {
    pub const ALL: [EntityKind; 23] = [
        EntityKind::UserAccount,
        EntityKind::Analyst,
        EntityKind::Administrator,
        EntityKind::Sop,
        EntityKind::UserSopAction,
        EntityKind::Client,
        EntityKind::Warehouse,
        EntityKind::WarehouseClientLink,
        EntityKind::Location,
        EntityKind::Equipment,
        EntityKind::MaintenanceLog,
        EntityKind::Sample,
        EntityKind::InProcess,
        EntityKind::Stability,
        EntityKind::FinishedProduct,
        EntityKind::UserSampleAction,
        EntityKind::Test,
        EntityKind::SampleTestLink,
        EntityKind::TestEquipmentLink,
        EntityKind::Reagent,
        EntityKind::UserReagentAction,
        EntityKind::TestReagentLink,
        EntityKind::VersionChange,
    ];

    /// Entity name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::UserAccount => "UserAccount",
            EntityKind::Analyst => "Analyst",
            EntityKind::Administrator => "Administrator",
            EntityKind::Sop => "SOP",
            EntityKind::UserSopAction => "UserSOPAction",
            EntityKind::Client => "Client",
            EntityKind::Warehouse => "Warehouse",
            EntityKind::WarehouseClientLink => "WarehouseClientLink",
            EntityKind::Location => "Location",
            EntityKind::Equipment => "Equipment",
            EntityKind::MaintenanceLog => "MaintenanceLog",
            EntityKind::Sample => "Sample",
            EntityKind::InProcess => "InProcess",
            EntityKind::Stability => "Stability",
            EntityKind::FinishedProduct => "FinishedProduct",
            EntityKind::UserSampleAction => "UserSampleAction",
            EntityKind::Test => "Test",
            EntityKind::SampleTestLink => "SampleTestLink",
            EntityKind::TestEquipmentLink => "TestEquipmentLink",
            EntityKind::Reagent => "Reagent",
            EntityKind::UserReagentAction => "UserReagentAction",
            EntityKind::TestReagentLink => "TestReagentLink",
            EntityKind::VersionChange => "VersionChange",
        }
    }

    /// Table name for the SQL-backed store.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::UserAccount => "user_account",
            EntityKind::Analyst => "analyst",
            EntityKind::Administrator => "administrator",
            EntityKind::Sop => "sop",
            EntityKind::UserSopAction => "user_sop_action",
            EntityKind::Client => "client",
            EntityKind::Warehouse => "warehouse",
            EntityKind::WarehouseClientLink => "warehouse_client_link",
            EntityKind::Location => "location",
            EntityKind::Equipment => "equipment",
            EntityKind::MaintenanceLog => "maintenance_log",
            EntityKind::Sample => "sample",
            EntityKind::InProcess => "in_process",
            EntityKind::Stability => "stability",
            EntityKind::FinishedProduct => "finished_product",
            EntityKind::UserSampleAction => "user_sample_action",
            EntityKind::Test => "test",
            EntityKind::SampleTestLink => "sample_test_link",
            EntityKind::TestEquipmentLink => "test_equipment_link",
            EntityKind::Reagent => "reagent",
            EntityKind::UserReagentAction => "user_reagent_action",
            EntityKind::TestReagentLink => "test_reagent_link",
            EntityKind::VersionChange => "version_change",
        }
    }

    /// Sample detail kind for a `sample_type` discriminator value.
    pub fn detail_for_sample_type(sample_type: &str) -> Option<EntityKind> {
        match sample_type {
            "I" => Some(EntityKind::InProcess),
            "S" => Some(EntityKind::Stability),
            "F" => Some(EntityKind::FinishedProduct),
            _ => None,
        }
    }

    /// True for the three one-to-one Sample detail kinds.
    pub fn is_sample_detail(self) -> bool {
        matches!(
            self,
            EntityKind::InProcess | EntityKind::Stability | EntityKind::FinishedProduct
        )
    }
}
