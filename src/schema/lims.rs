//! The built-in LIMS schema: per-entity field specs, unique constraints and
//! allowed operations. Foreign-key relations are the `Reference` fields; the
//! registry derives the cascade graph from them.

use super::entity::EntityKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Bool,
    Integer,
    Decimal,
    Date,
    DateTime,
    /// Foreign key to another entity; value is the target row's UUID.
    Reference(EntityKind),
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub max_length: Option<u32>,
    /// Named format check ("email").
    pub format: Option<&'static str>,
    /// Regex the value must match.
    pub pattern: Option<&'static str>,
    /// Closed value set (e.g. sample_type discriminator).
    pub allowed: Option<&'static [&'static str]>,
}

const fn field(name: &'static str, field_type: FieldType, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required,
        max_length: None,
        format: None,
        pattern: None,
        allowed: None,
    }
}

const fn text(name: &'static str, max: u32) -> FieldSpec {
    let mut f = field(name, FieldType::Text, true);
    f.max_length = Some(max);
    f
}

const fn opt_text(name: &'static str, max: u32) -> FieldSpec {
    let mut f = field(name, FieldType::Text, false);
    f.max_length = Some(max);
    f
}

const fn boolean(name: &'static str) -> FieldSpec {
    // Booleans default to false on create, so they are never required.
    field(name, FieldType::Bool, false)
}

const fn integer(name: &'static str) -> FieldSpec {
    field(name, FieldType::Integer, true)
}

const fn decimal(name: &'static str) -> FieldSpec {
    field(name, FieldType::Decimal, true)
}

const fn opt_decimal(name: &'static str) -> FieldSpec {
    field(name, FieldType::Decimal, false)
}

const fn date(name: &'static str) -> FieldSpec {
    field(name, FieldType::Date, true)
}

const fn datetime(name: &'static str) -> FieldSpec {
    field(name, FieldType::DateTime, true)
}

const fn opt_datetime(name: &'static str) -> FieldSpec {
    field(name, FieldType::DateTime, false)
}

const fn reference(name: &'static str, target: EntityKind) -> FieldSpec {
    field(name, FieldType::Reference(target), true)
}

pub const FULL_OPERATIONS: &[&str] = &["create", "read", "update", "delete"];
/// Append-only kinds: rows are written by the system, never through the API.
pub const READ_ONLY_OPERATIONS: &[&str] = &["read"];

#[derive(Clone, Copy, Debug)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub path_segment: &'static str,
    pub fields: &'static [FieldSpec],
    /// Field groups that must be unique across rows of this kind.
    pub uniques: &'static [&'static [&'static str]],
    pub operations: &'static [&'static str],
}

const fn entity(
    kind: EntityKind,
    path_segment: &'static str,
    fields: &'static [FieldSpec],
    uniques: &'static [&'static [&'static str]],
) -> EntitySpec {
    EntitySpec {
        kind,
        path_segment,
        fields,
        uniques,
        operations: FULL_OPERATIONS,
    }
}

const USER_ACCOUNT_FIELDS: &[FieldSpec] = &[
    text("account_username", 64),
    text("first_name", 64),
    text("last_name", 64),
    text("phone", 16),
    {
        let mut f = text("email", 255);
        f.format = Some("email");
        f
    },
    text("department", 255),
    boolean("training_completed"),
    boolean("is_analyst"),
    boolean("is_administrator"),
];

const ANALYST_FIELDS: &[FieldSpec] = &[
    reference("user_account", EntityKind::UserAccount),
    integer("access_level"),
    text("analyst_supervisor", 64),
];

const ADMINISTRATOR_FIELDS: &[FieldSpec] = &[
    reference("user_account", EntityKind::UserAccount),
    boolean("is_supervisor"),
];

const SOP_FIELDS: &[FieldSpec] = &[
    text("sop_name", 16),
    decimal("version_number"),
    date("effective_date"),
];

const USER_SOP_ACTION_FIELDS: &[FieldSpec] = &[
    reference("user_account", EntityKind::UserAccount),
    reference("sop", EntityKind::Sop),
    text("qa_author", 64),
    text("qa_reviewer", 64),
    text("qa_approver", 64),
];

const CLIENT_FIELDS: &[FieldSpec] = &[text("client_name", 64)];

const WAREHOUSE_FIELDS: &[FieldSpec] = &[
    reference("sop", EntityKind::Sop),
    text("warehouse_technician", 64),
    text("warehouse_facility", 64),
    text("warehouse_company", 64),
];

const WAREHOUSE_CLIENT_LINK_FIELDS: &[FieldSpec] = &[
    reference("warehouse", EntityKind::Warehouse),
    reference("client", EntityKind::Client),
    decimal("quantity_shipped"),
    text("delivery_service", 64),
    datetime("shipping_time"),
    datetime("delivery_time"),
    boolean("acceptable_delivery"),
];

const LOCATION_FIELDS: &[FieldSpec] = &[opt_text("location_type", 64), integer("room_number")];

const EQUIPMENT_FIELDS: &[FieldSpec] = &[
    reference("location", EntityKind::Location),
    reference("sop", EntityKind::Sop),
    text("equipment_name", 64),
    decimal("min_use_range"),
    decimal("max_use_range"),
    boolean("in_use"),
];

const MAINTENANCE_LOG_FIELDS: &[FieldSpec] = &[
    reference("equipment", EntityKind::Equipment),
    reference("sop", EntityKind::Sop),
    date("service_date"),
    field("service_description", FieldType::Text, true),
    text("service_interval", 64),
    date("next_service_date"),
];

const SAMPLE_FIELDS: &[FieldSpec] = &[
    reference("location", EntityKind::Location),
    reference("warehouse", EntityKind::Warehouse),
    reference("sop", EntityKind::Sop),
    text("product_name", 64),
    text("product_stage", 64),
    decimal("quantity"),
    opt_datetime("time_received"),
    {
        let mut f = text("sample_type", 1);
        f.allowed = Some(&["I", "S", "F"]);
        f
    },
    text("storage_conditions", 5),
];

const IN_PROCESS_FIELDS: &[FieldSpec] = &[
    reference("sample", EntityKind::Sample),
    datetime("time_sampled"),
];

const STABILITY_FIELDS: &[FieldSpec] = &[
    reference("sample", EntityKind::Sample),
    text("stability_conditions", 64),
];

const FINISHED_PRODUCT_FIELDS: &[FieldSpec] = &[
    reference("sample", EntityKind::Sample),
    decimal("product_lot_number"),
];

const USER_SAMPLE_ACTION_FIELDS: &[FieldSpec] = &[
    reference("user_account", EntityKind::UserAccount),
    reference("sample", EntityKind::Sample),
    text("receiving_analyst", 64),
    opt_text("aliquoting_analyst", 64),
];

const TEST_FIELDS: &[FieldSpec] = &[
    reference("user_account", EntityKind::UserAccount),
    reference("sop", EntityKind::Sop),
    opt_decimal("min_acceptable_result"),
    opt_decimal("max_acceptable_result"),
];

const SAMPLE_TEST_LINK_FIELDS: &[FieldSpec] = &[
    reference("sample", EntityKind::Sample),
    reference("test", EntityKind::Test),
    text("testing_analyst", 64),
    text("reviewing_analyst", 64),
    decimal("test_result"),
    datetime("deadline"),
    boolean("pass_or_fail"),
];

const TEST_EQUIPMENT_LINK_FIELDS: &[FieldSpec] = &[
    reference("test", EntityKind::Test),
    reference("equipment", EntityKind::Equipment),
];

const REAGENT_FIELDS: &[FieldSpec] = &[
    reference("sop", EntityKind::Sop),
    text("reagent_name", 255),
    {
        let mut f = text("cas_number", 12);
        f.pattern = Some(r"^\d{2,7}-\d{2}-\d$");
        f
    },
    text("lot_number", 255),
    text("vendor", 255),
    date("manufacturing_date"),
    // No ordering check against manufacturing_date; existing rows contain
    // inverted ranges.
    date("expiration_date"),
];

const USER_REAGENT_ACTION_FIELDS: &[FieldSpec] = &[
    reference("user_account", EntityKind::UserAccount),
    reference("reagent", EntityKind::Reagent),
    text("reagent_manager", 64),
];

const TEST_REAGENT_LINK_FIELDS: &[FieldSpec] = &[
    reference("test", EntityKind::Test),
    reference("reagent", EntityKind::Reagent),
    decimal("volume_used"),
];

const VERSION_CHANGE_FIELDS: &[FieldSpec] = &[
    decimal("old_version_number"),
    decimal("new_version_number"),
    date("old_effective_date"),
    date("new_effective_date"),
    reference("sop", EntityKind::Sop),
    date("change_date"),
];

/// The full schema, one spec per entity kind. Path segments match the
/// original REST router.
pub const SPECS: &[EntitySpec] = &[
    entity(
        EntityKind::UserAccount,
        "users",
        USER_ACCOUNT_FIELDS,
        &[&["account_username"], &["email"]],
    ),
    entity(
        EntityKind::Analyst,
        "analysts",
        ANALYST_FIELDS,
        &[&["user_account"]],
    ),
    entity(
        EntityKind::Administrator,
        "administrators",
        ADMINISTRATOR_FIELDS,
        &[&["user_account"]],
    ),
    entity(EntityKind::Sop, "sops", SOP_FIELDS, &[]),
    entity(
        EntityKind::UserSopAction,
        "user-sop-actions",
        USER_SOP_ACTION_FIELDS,
        &[],
    ),
    entity(EntityKind::Client, "clients", CLIENT_FIELDS, &[&["client_name"]]),
    entity(
        EntityKind::Warehouse,
        "warehouses",
        WAREHOUSE_FIELDS,
        &[&["warehouse_facility", "warehouse_company"]],
    ),
    entity(
        EntityKind::WarehouseClientLink,
        "warehouse-client-links",
        WAREHOUSE_CLIENT_LINK_FIELDS,
        &[],
    ),
    entity(EntityKind::Location, "locations", LOCATION_FIELDS, &[]),
    entity(EntityKind::Equipment, "equipment", EQUIPMENT_FIELDS, &[]),
    entity(
        EntityKind::MaintenanceLog,
        "maintenance-logs",
        MAINTENANCE_LOG_FIELDS,
        &[],
    ),
    entity(EntityKind::Sample, "samples", SAMPLE_FIELDS, &[]),
    entity(
        EntityKind::InProcess,
        "in-process",
        IN_PROCESS_FIELDS,
        &[&["sample"]],
    ),
    entity(
        EntityKind::Stability,
        "stability",
        STABILITY_FIELDS,
        &[&["sample"]],
    ),
    entity(
        EntityKind::FinishedProduct,
        "finished-products",
        FINISHED_PRODUCT_FIELDS,
        &[&["sample"]],
    ),
    entity(
        EntityKind::UserSampleAction,
        "user-sample-actions",
        USER_SAMPLE_ACTION_FIELDS,
        &[],
    ),
    entity(EntityKind::Test, "tests", TEST_FIELDS, &[&["sop"]]),
    entity(
        EntityKind::SampleTestLink,
        "sample-test-links",
        SAMPLE_TEST_LINK_FIELDS,
        &[],
    ),
    entity(
        EntityKind::TestEquipmentLink,
        "test-equipment-links",
        TEST_EQUIPMENT_LINK_FIELDS,
        &[],
    ),
    entity(EntityKind::Reagent, "reagents", REAGENT_FIELDS, &[]),
    entity(
        EntityKind::UserReagentAction,
        "user-reagent-actions",
        USER_REAGENT_ACTION_FIELDS,
        &[],
    ),
    entity(
        EntityKind::TestReagentLink,
        "test-reagent-links",
        TEST_REAGENT_LINK_FIELDS,
        &[],
    ),
    EntitySpec {
        kind: EntityKind::VersionChange,
        path_segment: "version-changes",
        fields: VERSION_CHANGE_FIELDS,
        uniques: &[],
        operations: READ_ONLY_OPERATIONS,
    },
];
