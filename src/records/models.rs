//! Record Models
//! Mission: Patient aggregate and its doctor, hospital and illness sub-records
//!
//! Wire names follow the mobile client (`spec`, `regno`, `prescribedmed`, ...).

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Trimmed, non-empty value of an optional text field
fn present(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required(field: Option<String>) -> Result<String, ValidationError> {
    present(field).ok_or_else(ValidationError::missing_fields)
}

/// A field the client may leave out, send as null, or send with a value.
/// `None` means absent; `Some(None)` means an explicit null.
pub type Provided = Option<Option<String>>;

fn provided<'de, D>(deserializer: D) -> Result<Provided, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// A required field may be omitted from an update but not blanked
fn not_blank(field: &Provided, name: &str) -> Result<(), ValidationError> {
    match field {
        Some(value) if present(value.clone()).is_none() => {
            Err(ValidationError(format!("{} cannot be empty", name)))
        }
        _ => Ok(()),
    }
}

/// Patient row, without its sub-record lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(name: String, age: u32, gender: String, owner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            age,
            gender,
            created_by: owner,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Patient with its sub-record lists expanded, in insertion order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDetails {
    #[serde(flatten)]
    pub patient: Patient,
    pub doctors: Vec<Doctor>,
    pub hospitals: Vec<Hospital>,
    pub illnesses: Vec<Illness>,
}

impl PatientDetails {
    pub fn without_records(patient: Patient) -> Self {
        Self {
            patient,
            doctors: Vec::new(),
            hospitals: Vec::new(),
            illnesses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "spec")]
    pub specialization: String,
    #[serde(rename = "regno")]
    pub registration_number: Option<String>,
    #[serde(rename = "doccontact")]
    pub contact: Option<String>,
    pub patient_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub contact: String,
    pub patient_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Illness {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub symptoms: String,
    pub diagnosis: String,
    pub treatment: String,
    #[serde(rename = "prescribedmed")]
    pub prescribed_medicine: String,
    #[serde(rename = "prescribedtime")]
    pub prescribed_duration: String,
    #[serde(rename = "recoverytime")]
    pub recovery_duration: Option<String>,
    pub surgery: Option<String>,
    #[serde(rename = "surdetails")]
    pub surgery_details: Option<String>,
    pub patient_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Patient age as sent by the client: a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AgeValue {
    Whole(i64),
    Fractional(f64),
    Text(String),
}

impl AgeValue {
    /// Coerce to a positive whole number of years
    pub fn to_age(&self) -> Result<u32, ValidationError> {
        let invalid = || ValidationError("Age must be a positive integer".to_string());

        let whole = match self {
            AgeValue::Whole(n) => *n,
            AgeValue::Fractional(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
            AgeValue::Fractional(_) => return Err(invalid()),
            AgeValue::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(n) => n,
                    Err(_) => match s.parse::<f64>() {
                        Ok(f) if f.fract() == 0.0 && f.is_finite() => f as i64,
                        _ => return Err(invalid()),
                    },
                }
            }
        };

        u32::try_from(whole)
            .ok()
            .filter(|age| *age > 0)
            .ok_or_else(invalid)
    }
}

/// Body of POST /patientinfo
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    pub name: Option<String>,
    pub age: Option<AgeValue>,
    pub gender: Option<String>,
    pub user_id: Option<Uuid>,
}

impl CreatePatientRequest {
    pub fn into_patient(self) -> Result<Patient, ValidationError> {
        let (Some(name), Some(age), Some(gender), Some(owner)) = (
            present(self.name),
            self.age,
            present(self.gender),
            self.user_id,
        ) else {
            return Err(ValidationError::missing_fields());
        };

        Ok(Patient::new(name, age.to_age()?, gender, owner))
    }
}

/// Doctor fields from a create call or an update-records payload.
/// `_id` selects an existing doctor to update in place.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorInput {
    #[serde(rename = "_id")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "provided")]
    pub name: Provided,
    #[serde(rename = "spec", default, deserialize_with = "provided")]
    pub specialization: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub regno: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub doccontact: Provided,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalInput {
    #[serde(rename = "_id")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "provided")]
    pub name: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub address: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub contact: Provided,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IllnessInput {
    #[serde(rename = "_id")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "provided")]
    pub symptoms: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub diagnosis: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub treatment: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub prescribedmed: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub prescribedtime: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub recoverytime: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub surgery: Provided,
    #[serde(default, deserialize_with = "provided")]
    pub surdetails: Provided,
    pub patient_id: Option<Uuid>,
}

impl DoctorInput {
    /// Reject required fields that are sent but blank
    pub fn check_replacements(&self) -> Result<(), ValidationError> {
        not_blank(&self.name, "name")?;
        not_blank(&self.specialization, "spec")
    }
}

impl HospitalInput {
    pub fn check_replacements(&self) -> Result<(), ValidationError> {
        not_blank(&self.name, "name")?;
        not_blank(&self.address, "address")?;
        not_blank(&self.contact, "contact")
    }
}

impl IllnessInput {
    pub fn check_replacements(&self) -> Result<(), ValidationError> {
        not_blank(&self.symptoms, "symptoms")?;
        not_blank(&self.diagnosis, "diagnosis")?;
        not_blank(&self.treatment, "treatment")?;
        not_blank(&self.prescribedmed, "prescribedmed")?;
        not_blank(&self.prescribedtime, "prescribedtime")
    }
}

impl Doctor {
    pub fn from_input(input: DoctorInput, patient_id: Option<Uuid>) -> Result<Self, ValidationError> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: required(input.name.flatten())?,
            specialization: required(input.specialization.flatten())?,
            registration_number: present(input.regno.flatten()),
            contact: present(input.doccontact.flatten()),
            patient_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the fields sent in `input`. Optional fields sent as null or
    /// blank are cleared. The patient link is untouched.
    pub fn apply(&mut self, input: DoctorInput) {
        if let Some(name) = present(input.name.flatten()) {
            self.name = name;
        }
        if let Some(spec) = present(input.specialization.flatten()) {
            self.specialization = spec;
        }
        if let Some(regno) = input.regno {
            self.registration_number = present(regno);
        }
        if let Some(contact) = input.doccontact {
            self.contact = present(contact);
        }
        self.updated_at = Utc::now();
    }
}

impl Hospital {
    pub fn from_input(
        input: HospitalInput,
        patient_id: Option<Uuid>,
    ) -> Result<Self, ValidationError> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: required(input.name.flatten())?,
            address: required(input.address.flatten())?,
            contact: required(input.contact.flatten())?,
            patient_id,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, input: HospitalInput) {
        if let Some(name) = present(input.name.flatten()) {
            self.name = name;
        }
        if let Some(address) = present(input.address.flatten()) {
            self.address = address;
        }
        if let Some(contact) = present(input.contact.flatten()) {
            self.contact = contact;
        }
        self.updated_at = Utc::now();
    }
}

impl Illness {
    pub fn from_input(
        input: IllnessInput,
        patient_id: Option<Uuid>,
    ) -> Result<Self, ValidationError> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            symptoms: required(input.symptoms.flatten())?,
            diagnosis: required(input.diagnosis.flatten())?,
            treatment: required(input.treatment.flatten())?,
            prescribed_medicine: required(input.prescribedmed.flatten())?,
            prescribed_duration: required(input.prescribedtime.flatten())?,
            recovery_duration: present(input.recoverytime.flatten()),
            surgery: present(input.surgery.flatten()),
            surgery_details: present(input.surdetails.flatten()),
            patient_id,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, input: IllnessInput) {
        if let Some(v) = present(input.symptoms.flatten()) {
            self.symptoms = v;
        }
        if let Some(v) = present(input.diagnosis.flatten()) {
            self.diagnosis = v;
        }
        if let Some(v) = present(input.treatment.flatten()) {
            self.treatment = v;
        }
        if let Some(v) = present(input.prescribedmed.flatten()) {
            self.prescribed_medicine = v;
        }
        if let Some(v) = present(input.prescribedtime.flatten()) {
            self.prescribed_duration = v;
        }
        if let Some(v) = input.recoverytime {
            self.recovery_duration = present(v);
        }
        if let Some(v) = input.surgery {
            self.surgery = present(v);
        }
        if let Some(v) = input.surdetails {
            self.surgery_details = present(v);
        }
        self.updated_at = Utc::now();
    }
}

/// Body of PUT /patient/:patientId/updateRecords
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecordsRequest {
    pub name: Option<String>,
    pub age: Option<AgeValue>,
    pub gender: Option<String>,
    pub doctor: Option<DoctorInput>,
    pub hospital: Option<HospitalInput>,
    pub illness: Option<IllnessInput>,
}

/// Scalar patient changes; `None` leaves the field as it is
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PatientChanges {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

/// Either an in-place update of an existing sub-record or a new one to link
#[derive(Debug, Clone)]
pub enum SubRecordChange<R, I> {
    Update { id: Uuid, input: I },
    Create(R),
}

/// Validated form of an update-records request
#[derive(Debug, Default)]
pub struct RecordsUpdate {
    pub patient: PatientChanges,
    pub doctor: Option<SubRecordChange<Doctor, DoctorInput>>,
    pub hospital: Option<SubRecordChange<Hospital, HospitalInput>>,
    pub illness: Option<SubRecordChange<Illness, IllnessInput>>,
}

impl UpdateRecordsRequest {
    /// Validate against the patient being updated. New sub-records are linked to it.
    pub fn into_update(self, patient_id: Uuid) -> Result<RecordsUpdate, ValidationError> {
        let age = match self.age {
            Some(age) => Some(age.to_age()?),
            None => None,
        };

        let doctor = match self.doctor {
            Some(input) => Some(match input.id {
                Some(id) => {
                    input.check_replacements()?;
                    SubRecordChange::Update { id, input }
                }
                None => SubRecordChange::Create(Doctor::from_input(input, Some(patient_id))?),
            }),
            None => None,
        };

        let hospital = match self.hospital {
            Some(input) => Some(match input.id {
                Some(id) => {
                    input.check_replacements()?;
                    SubRecordChange::Update { id, input }
                }
                None => SubRecordChange::Create(Hospital::from_input(input, Some(patient_id))?),
            }),
            None => None,
        };

        let illness = match self.illness {
            Some(input) => Some(match input.id {
                Some(id) => {
                    input.check_replacements()?;
                    SubRecordChange::Update { id, input }
                }
                None => SubRecordChange::Create(Illness::from_input(input, Some(patient_id))?),
            }),
            None => None,
        };

        Ok(RecordsUpdate {
            patient: PatientChanges {
                name: present(self.name),
                age,
                gender: present(self.gender),
            },
            doctor,
            hospital,
            illness,
        })
    }
}

/// Counters reported on the owner profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub patients: u64,
    pub doctors: u64,
    pub hospitals: u64,
    pub illnesses: u64,
}

/// Result of a cascading patient delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub doctors: usize,
    pub hospitals: usize,
    pub illnesses: usize,
    pub patient_deleted: bool,
}
