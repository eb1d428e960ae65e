//! High-level operation requests. The client runs the same controller
//! locally, then builds the matching request with these constructors; the
//! server validates and re-applies it authoritatively.

use serde::{Deserialize, Serialize};

use crate::actors::Job;
use crate::catalog::ObjectType;
use crate::Position;

/// Tagged request record for every high-level operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OperationRequest {
    PickUp {
        person_id: String,
        object_id: String,
    },
    Drop {
        person_id: String,
        object_id: String,
    },
    Craft {
        person_id: String,
        product: ObjectType,
    },
    ConstructBuilding {
        person_id: String,
        position: Position,
    },
    BuildStockpile {
        person_id: String,
        position: Position,
    },
    RemoveStockpileTile {
        person_id: String,
        position: Position,
    },
    Deposit {
        person_id: String,
        object_id: String,
        stockpile_id: String,
    },
    Withdraw {
        person_id: String,
        stockpile_id: String,
        object_id: String,
        amount: u32,
    },
    SetNpcJob {
        npc_id: String,
        job: Job,
    },
    HarvestResource {
        person_id: String,
        resource_id: String,
    },
}

pub fn build_pick_up_request(person_id: &str, object_id: &str) -> OperationRequest {
    OperationRequest::PickUp {
        person_id: person_id.to_string(),
        object_id: object_id.to_string(),
    }
}

pub fn build_drop_request(person_id: &str, object_id: &str) -> OperationRequest {
    OperationRequest::Drop {
        person_id: person_id.to_string(),
        object_id: object_id.to_string(),
    }
}

pub fn build_craft_request(person_id: &str, product: ObjectType) -> OperationRequest {
    OperationRequest::Craft {
        person_id: person_id.to_string(),
        product,
    }
}

pub fn build_construct_building_request(person_id: &str, position: Position) -> OperationRequest {
    OperationRequest::ConstructBuilding {
        person_id: person_id.to_string(),
        position,
    }
}

pub fn build_stockpile_request(person_id: &str, position: Position) -> OperationRequest {
    OperationRequest::BuildStockpile {
        person_id: person_id.to_string(),
        position,
    }
}

pub fn build_remove_stockpile_tile_request(person_id: &str, position: Position) -> OperationRequest {
    OperationRequest::RemoveStockpileTile {
        person_id: person_id.to_string(),
        position,
    }
}

pub fn build_deposit_request(
    person_id: &str,
    object_id: &str,
    stockpile_id: &str,
) -> OperationRequest {
    OperationRequest::Deposit {
        person_id: person_id.to_string(),
        object_id: object_id.to_string(),
        stockpile_id: stockpile_id.to_string(),
    }
}

pub fn build_withdraw_request(
    person_id: &str,
    stockpile_id: &str,
    object_id: &str,
    amount: u32,
) -> OperationRequest {
    OperationRequest::Withdraw {
        person_id: person_id.to_string(),
        stockpile_id: stockpile_id.to_string(),
        object_id: object_id.to_string(),
        amount,
    }
}

pub fn build_set_npc_job_request(npc_id: &str, job: Job) -> OperationRequest {
    OperationRequest::SetNpcJob {
        npc_id: npc_id.to_string(),
        job,
    }
}

pub fn build_harvest_resource_request(person_id: &str, resource_id: &str) -> OperationRequest {
    OperationRequest::HarvestResource {
        person_id: person_id.to_string(),
        resource_id: resource_id.to_string(),
    }
}
