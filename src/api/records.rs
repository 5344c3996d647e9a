//! Record API Endpoints
//! Mission: Create, read, update and delete patients and their linked records

use crate::api::{AppState, DataResponse};
use crate::auth::models::Claims;
use crate::error::ApiError;
use crate::records::models::{
    CreatePatientRequest, Doctor, DoctorInput, Hospital, HospitalInput, Illness, IllnessInput,
    PatientDetails, ProfileStats, UpdateRecordsRequest,
};
use crate::records::{SubRecord, UpdateOutcome};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUser {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: ProfileUser,
    pub stats: ProfileStats,
}

/// Path ids are UUIDs; anything else is a malformed request
fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Validation(format!("Invalid {} id", what)))
}

/// POST /patientinfo
pub async fn create_patient(
    State(state): State<AppState>,
    payload: Result<Json<CreatePatientRequest>, JsonRejection>,
) -> Result<Json<DataResponse<PatientDetails>>, ApiError> {
    let Json(payload) = payload?;
    let patient = payload.into_patient()?;

    if !state.users.user_exists(&patient.created_by)? {
        return Err(ApiError::not_found("User"));
    }

    let details = state.records.create_patient(patient)?;
    Ok(Json(DataResponse::ok(details)))
}

/// Shared tail of the three sub-record create endpoints
fn store_sub_record<R: SubRecord>(state: &AppState, record: R) -> Result<R, ApiError> {
    state
        .records
        .create_sub_record(record)?
        .ok_or_else(|| ApiError::not_found("Patient"))
}

/// POST /doctorinfo
pub async fn create_doctor(
    State(state): State<AppState>,
    payload: Result<Json<DoctorInput>, JsonRejection>,
) -> Result<Json<DataResponse<Doctor>>, ApiError> {
    let Json(input) = payload?;
    let patient_id = input.patient_id;
    let doctor = store_sub_record(&state, Doctor::from_input(input, patient_id)?)?;
    Ok(Json(DataResponse::ok(doctor)))
}

/// POST /hospitalinfo
pub async fn create_hospital(
    State(state): State<AppState>,
    payload: Result<Json<HospitalInput>, JsonRejection>,
) -> Result<Json<DataResponse<Hospital>>, ApiError> {
    let Json(input) = payload?;
    let patient_id = input.patient_id;
    let hospital = store_sub_record(&state, Hospital::from_input(input, patient_id)?)?;
    Ok(Json(DataResponse::ok(hospital)))
}

/// POST /illnessinfo
pub async fn create_illness(
    State(state): State<AppState>,
    payload: Result<Json<IllnessInput>, JsonRejection>,
) -> Result<Json<DataResponse<Illness>>, ApiError> {
    let Json(input) = payload?;
    let patient_id = input.patient_id;
    let illness = store_sub_record(&state, Illness::from_input(input, patient_id)?)?;
    Ok(Json(DataResponse::ok(illness)))
}

/// GET /getpatientinfo/:id
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<PatientDetails>>, ApiError> {
    let id = parse_id(&id, "patient")?;
    let details = state
        .records
        .get_patient(&id)?
        .ok_or_else(|| ApiError::not_found("Patient"))?;
    Ok(Json(DataResponse::ok(details)))
}

/// GET /patients?userId= - bare array, no auth
pub async fn list_patients(
    State(state): State<AppState>,
    query: Result<Query<OwnerQuery>, QueryRejection>,
) -> Result<Json<Vec<PatientDetails>>, ApiError> {
    let Query(query) = query?;
    let owner = query
        .user_id
        .ok_or_else(|| ApiError::Validation("userId is required".to_string()))?;

    let patients = state.records.list_patients_for_owner(&owner)?;
    debug!("Listed {} patients for {}", patients.len(), owner);
    Ok(Json(patients))
}

/// GET /mypatients (bearer-gated)
pub async fn my_patients(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DataResponse<Vec<PatientDetails>>>, ApiError> {
    let owner = claims
        .user_id()
        .ok_or_else(|| ApiError::Forbidden("Invalid or expired token".to_string()))?;

    let patients = state.records.list_patients_for_owner(&owner)?;
    Ok(Json(DataResponse::ok(patients)))
}

/// PUT /patient/:patientId/updateRecords
pub async fn update_records(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    payload: Result<Json<UpdateRecordsRequest>, JsonRejection>,
) -> Result<Json<DataResponse<PatientDetails>>, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let Json(payload) = payload?;
    let update = payload.into_update(patient_id)?;

    match state.records.update_records(&patient_id, update)? {
        UpdateOutcome::Updated(details) => Ok(Json(DataResponse::ok(details))),
        UpdateOutcome::PatientNotFound => Err(ApiError::not_found("Patient")),
        UpdateOutcome::RecordNotFound { kind, id } => {
            debug!("{} {} is not a record of patient {}", kind, id, patient_id);
            Err(ApiError::not_found(kind))
        }
    }
}

/// DELETE /patient/:id
pub async fn delete_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "patient")?;
    let summary = state.records.delete_patient(&id)?;

    if !summary.patient_deleted {
        return Err(ApiError::not_found("Patient"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Patient and related records deleted successfully",
    })))
}

/// GET /user/:userId/profile
pub async fn user_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let user = state
        .users
        .get_user_by_id(&user_id)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let stats = state.records.owner_stats(&user.id, state.profile_scope)?;
    info!("📊 Profile for {}: {} patients", user.email, stats.patients);

    Ok(Json(ProfileResponse {
        user: ProfileUser {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        },
        stats,
    }))
}
