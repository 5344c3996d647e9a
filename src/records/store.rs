//! Record Graph Storage
//! Mission: Persist patients and their linked sub-records with SQLite
//!
//! Multi-step operations (create + link, update records, cascading delete)
//! each run inside one transaction.

use crate::config::ProfileCountScope;
use crate::db::{opt_uuid_col, timestamp_col, timestamp_to_sql, uuid_col, Database};
use crate::records::models::{
    CascadeSummary, Doctor, DoctorInput, Hospital, HospitalInput, Illness, IllnessInput, Patient,
    PatientDetails, ProfileStats, RecordsUpdate, SubRecordChange,
};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

const PATIENT_COLUMNS: &str = "id, name, age, gender, created_by, created_at, updated_at";

/// A record type hanging off a Patient through its `patient_id` column
pub trait SubRecord: Sized {
    /// Partial field set used for in-place updates
    type Input;

    /// Human-readable kind, used in not-found messages
    const KIND: &'static str;
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn id(&self) -> Uuid;
    fn patient_id(&self) -> Option<Uuid>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize>;
    /// Write every column except id and patient link
    fn save(&self, conn: &Connection) -> rusqlite::Result<usize>;
    fn apply_input(&mut self, input: Self::Input);
}

impl SubRecord for Doctor {
    type Input = DoctorInput;

    const KIND: &'static str = "Doctor";
    const TABLE: &'static str = "doctors";
    const COLUMNS: &'static str =
        "id, name, spec, regno, doccontact, patient_id, created_at, updated_at";

    fn id(&self) -> Uuid {
        self.id
    }

    fn patient_id(&self) -> Option<Uuid> {
        self.patient_id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Doctor {
            id: uuid_col(row, 0)?,
            name: row.get(1)?,
            specialization: row.get(2)?,
            registration_number: row.get(3)?,
            contact: row.get(4)?,
            patient_id: opt_uuid_col(row, 5)?,
            created_at: timestamp_col(row, 6)?,
            updated_at: timestamp_col(row, 7)?,
        })
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO doctors (id, name, spec, regno, doccontact, patient_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.id.to_string(),
                self.name,
                self.specialization,
                self.registration_number,
                self.contact,
                self.patient_id.map(|id| id.to_string()),
                timestamp_to_sql(&self.created_at),
                timestamp_to_sql(&self.updated_at),
            ],
        )
    }

    fn save(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE doctors SET name = ?2, spec = ?3, regno = ?4, doccontact = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                self.id.to_string(),
                self.name,
                self.specialization,
                self.registration_number,
                self.contact,
                timestamp_to_sql(&self.updated_at),
            ],
        )
    }

    fn apply_input(&mut self, input: DoctorInput) {
        self.apply(input);
    }
}

impl SubRecord for Hospital {
    type Input = HospitalInput;

    const KIND: &'static str = "Hospital";
    const TABLE: &'static str = "hospitals";
    const COLUMNS: &'static str = "id, name, address, contact, patient_id, created_at, updated_at";

    fn id(&self) -> Uuid {
        self.id
    }

    fn patient_id(&self) -> Option<Uuid> {
        self.patient_id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Hospital {
            id: uuid_col(row, 0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            contact: row.get(3)?,
            patient_id: opt_uuid_col(row, 4)?,
            created_at: timestamp_col(row, 5)?,
            updated_at: timestamp_col(row, 6)?,
        })
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO hospitals (id, name, address, contact, patient_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id.to_string(),
                self.name,
                self.address,
                self.contact,
                self.patient_id.map(|id| id.to_string()),
                timestamp_to_sql(&self.created_at),
                timestamp_to_sql(&self.updated_at),
            ],
        )
    }

    fn save(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE hospitals SET name = ?2, address = ?3, contact = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                self.id.to_string(),
                self.name,
                self.address,
                self.contact,
                timestamp_to_sql(&self.updated_at),
            ],
        )
    }

    fn apply_input(&mut self, input: HospitalInput) {
        self.apply(input);
    }
}

impl SubRecord for Illness {
    type Input = IllnessInput;

    const KIND: &'static str = "Illness";
    const TABLE: &'static str = "illnesses";
    const COLUMNS: &'static str = "id, symptoms, diagnosis, treatment, prescribedmed, prescribedtime, \
         recoverytime, surgery, surdetails, patient_id, created_at, updated_at";

    fn id(&self) -> Uuid {
        self.id
    }

    fn patient_id(&self) -> Option<Uuid> {
        self.patient_id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Illness {
            id: uuid_col(row, 0)?,
            symptoms: row.get(1)?,
            diagnosis: row.get(2)?,
            treatment: row.get(3)?,
            prescribed_medicine: row.get(4)?,
            prescribed_duration: row.get(5)?,
            recovery_duration: row.get(6)?,
            surgery: row.get(7)?,
            surgery_details: row.get(8)?,
            patient_id: opt_uuid_col(row, 9)?,
            created_at: timestamp_col(row, 10)?,
            updated_at: timestamp_col(row, 11)?,
        })
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO illnesses (id, symptoms, diagnosis, treatment, prescribedmed, prescribedtime,
                                    recoverytime, surgery, surdetails, patient_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                self.id.to_string(),
                self.symptoms,
                self.diagnosis,
                self.treatment,
                self.prescribed_medicine,
                self.prescribed_duration,
                self.recovery_duration,
                self.surgery,
                self.surgery_details,
                self.patient_id.map(|id| id.to_string()),
                timestamp_to_sql(&self.created_at),
                timestamp_to_sql(&self.updated_at),
            ],
        )
    }

    fn save(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE illnesses SET symptoms = ?2, diagnosis = ?3, treatment = ?4, prescribedmed = ?5,
                                  prescribedtime = ?6, recoverytime = ?7, surgery = ?8, surdetails = ?9,
                                  updated_at = ?10
             WHERE id = ?1",
            params![
                self.id.to_string(),
                self.symptoms,
                self.diagnosis,
                self.treatment,
                self.prescribed_medicine,
                self.prescribed_duration,
                self.recovery_duration,
                self.surgery,
                self.surgery_details,
                timestamp_to_sql(&self.updated_at),
            ],
        )
    }

    fn apply_input(&mut self, input: IllnessInput) {
        self.apply(input);
    }
}

/// Outcome of an update-records call
#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(PatientDetails),
    PatientNotFound,
    /// An `_id` did not resolve to a sub-record of this patient
    RecordNotFound { kind: &'static str, id: Uuid },
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        created_by: uuid_col(row, 4)?,
        created_at: timestamp_col(row, 5)?,
        updated_at: timestamp_col(row, 6)?,
    })
}

fn load_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>> {
    let mut stmt =
        conn.prepare_cached(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"))?;
    stmt.query_row(params![id.to_string()], patient_from_row)
        .optional()
        .context("Failed to load patient")
}

/// Bump a patient's `updated_at`; false when the patient does not exist
fn touch_patient(conn: &Connection, id: &Uuid) -> Result<bool> {
    let touched = conn
        .execute(
            "UPDATE patients SET updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), timestamp_to_sql(&Utc::now())],
        )
        .context("Failed to touch patient")?;
    Ok(touched > 0)
}

fn load_sub_record<R: SubRecord>(conn: &Connection, id: &Uuid) -> Result<Option<R>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM {} WHERE id = ?1",
        R::COLUMNS,
        R::TABLE
    ))?;
    stmt.query_row(params![id.to_string()], R::from_row)
        .optional()
        .with_context(|| format!("Failed to load {}", R::KIND))
}

/// Sub-records linked to a patient, oldest first
fn linked_records<R: SubRecord>(conn: &Connection, patient_id: &Uuid) -> Result<Vec<R>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM {} WHERE patient_id = ?1 ORDER BY rowid ASC",
        R::COLUMNS,
        R::TABLE
    ))?;
    let records = stmt
        .query_map(params![patient_id.to_string()], R::from_row)?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list {} records", R::KIND))?;
    Ok(records)
}

fn expand(conn: &Connection, patient: Patient) -> Result<PatientDetails> {
    let doctors = linked_records::<Doctor>(conn, &patient.id)?;
    let hospitals = linked_records::<Hospital>(conn, &patient.id)?;
    let illnesses = linked_records::<Illness>(conn, &patient.id)?;
    Ok(PatientDetails {
        patient,
        doctors,
        hospitals,
        illnesses,
    })
}

/// Apply one sub-record change for `patient_id`. Returns the target id when an
/// update names a record that does not exist or belongs to another patient.
fn apply_optional<R: SubRecord>(
    conn: &Connection,
    patient_id: &Uuid,
    change: Option<SubRecordChange<R, R::Input>>,
) -> Result<Option<Uuid>> {
    match change {
        None => Ok(None),
        Some(SubRecordChange::Update { id, input }) => {
            let Some(mut record) = load_sub_record::<R>(conn, &id)? else {
                return Ok(Some(id));
            };
            if record.patient_id() != Some(*patient_id) {
                return Ok(Some(id));
            }
            record.apply_input(input);
            record
                .save(conn)
                .with_context(|| format!("Failed to update {}", R::KIND))?;
            debug!("Updated {} {} in place", R::KIND, id);
            Ok(None)
        }
        Some(SubRecordChange::Create(record)) => {
            record
                .insert(conn)
                .with_context(|| format!("Failed to insert {}", R::KIND))?;
            debug!("Linked new {} {} to patient {}", R::KIND, record.id(), patient_id);
            Ok(None)
        }
    }
}

fn count_linked<R: SubRecord>(
    conn: &Connection,
    owner: &Uuid,
    scope: ProfileCountScope,
) -> Result<u64> {
    let count: i64 = match scope {
        ProfileCountScope::Owner => conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE patient_id IN
                 (SELECT id FROM patients WHERE created_by = ?1)",
                R::TABLE
            ),
            params![owner.to_string()],
            |row| row.get(0),
        )?,
        ProfileCountScope::Global => conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE patient_id IS NOT NULL", R::TABLE),
            [],
            |row| row.get(0),
        )?,
    };
    Ok(count.max(0) as u64)
}

/// Patient aggregate storage with SQLite backend
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new patient; it starts with no linked records
    pub fn create_patient(&self, patient: Patient) -> Result<PatientDetails> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO patients (id, name, age, gender, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                patient.id.to_string(),
                patient.name,
                patient.age,
                patient.gender,
                patient.created_by.to_string(),
                timestamp_to_sql(&patient.created_at),
                timestamp_to_sql(&patient.updated_at),
            ],
        )
        .context("Failed to insert patient")?;

        info!("🩺 Created patient {} for owner {}", patient.id, patient.created_by);

        Ok(PatientDetails::without_records(patient))
    }

    /// Patient with doctors, hospitals and illnesses expanded
    pub fn get_patient(&self, id: &Uuid) -> Result<Option<PatientDetails>> {
        let conn = self.db.lock();
        match load_patient(&conn, id)? {
            Some(patient) => Ok(Some(expand(&conn, patient)?)),
            None => Ok(None),
        }
    }

    /// All patients of an owner, expanded, newest first
    pub fn list_patients_for_owner(&self, owner: &Uuid) -> Result<Vec<PatientDetails>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE created_by = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let patients = stmt
            .query_map(params![owner.to_string()], patient_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list patients")?;
        drop(stmt);

        patients
            .into_iter()
            .map(|patient| expand(&conn, patient))
            .collect()
    }

    /// Persist a sub-record, linking it to its patient in the same transaction.
    /// Returns `None` when the record names a patient that does not exist.
    pub fn create_sub_record<R: SubRecord>(&self, record: R) -> Result<Option<R>> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        if let Some(patient_id) = record.patient_id() {
            if !touch_patient(&tx, &patient_id)? {
                return Ok(None);
            }
        }

        record
            .insert(&tx)
            .with_context(|| format!("Failed to insert {}", R::KIND))?;
        tx.commit()?;

        info!(
            "📝 Created {} {} (patient: {:?})",
            R::KIND,
            record.id(),
            record.patient_id()
        );

        Ok(Some(record))
    }

    pub fn get_sub_record<R: SubRecord>(&self, id: &Uuid) -> Result<Option<R>> {
        let conn = self.db.lock();
        load_sub_record::<R>(&conn, id)
    }

    /// Partial patient update plus at most one sub-record change per type,
    /// all in one transaction. Returns the reloaded, expanded patient.
    pub fn update_records(&self, patient_id: &Uuid, update: RecordsUpdate) -> Result<UpdateOutcome> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let Some(mut patient) = load_patient(&tx, patient_id)? else {
            return Ok(UpdateOutcome::PatientNotFound);
        };

        let RecordsUpdate {
            patient: changes,
            doctor,
            hospital,
            illness,
        } = update;

        if let Some(name) = changes.name {
            patient.name = name;
        }
        if let Some(age) = changes.age {
            patient.age = age;
        }
        if let Some(gender) = changes.gender {
            patient.gender = gender;
        }
        patient.updated_at = Utc::now();

        tx.execute(
            "UPDATE patients SET name = ?2, age = ?3, gender = ?4, updated_at = ?5 WHERE id = ?1",
            params![
                patient.id.to_string(),
                patient.name,
                patient.age,
                patient.gender,
                timestamp_to_sql(&patient.updated_at),
            ],
        )
        .context("Failed to update patient")?;

        if let Some(id) = apply_optional::<Doctor>(&tx, patient_id, doctor)? {
            return Ok(UpdateOutcome::RecordNotFound { kind: Doctor::KIND, id });
        }
        if let Some(id) = apply_optional::<Hospital>(&tx, patient_id, hospital)? {
            return Ok(UpdateOutcome::RecordNotFound { kind: Hospital::KIND, id });
        }
        if let Some(id) = apply_optional::<Illness>(&tx, patient_id, illness)? {
            return Ok(UpdateOutcome::RecordNotFound { kind: Illness::KIND, id });
        }

        let details = expand(&tx, patient)?;
        tx.commit()?;

        info!("✏️  Updated records of patient {}", patient_id);

        Ok(UpdateOutcome::Updated(details))
    }

    /// Delete all sub-records linked to the patient, then the patient itself.
    /// The sub-record deletes are kept even when the patient row is already gone.
    pub fn delete_patient(&self, patient_id: &Uuid) -> Result<CascadeSummary> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        let id = patient_id.to_string();

        let illnesses = tx.execute("DELETE FROM illnesses WHERE patient_id = ?1", params![id])?;
        let doctors = tx.execute("DELETE FROM doctors WHERE patient_id = ?1", params![id])?;
        let hospitals = tx.execute("DELETE FROM hospitals WHERE patient_id = ?1", params![id])?;
        let patients = tx.execute("DELETE FROM patients WHERE id = ?1", params![id])?;

        tx.commit().context("Failed to commit patient delete")?;

        let summary = CascadeSummary {
            doctors,
            hospitals,
            illnesses,
            patient_deleted: patients > 0,
        };

        info!(
            "🗑️  Deleted patient {} (found: {}, doctors: {}, hospitals: {}, illnesses: {})",
            patient_id, summary.patient_deleted, doctors, hospitals, illnesses
        );

        Ok(summary)
    }

    /// Patient and sub-record counters for the owner profile
    pub fn owner_stats(&self, owner: &Uuid, scope: ProfileCountScope) -> Result<ProfileStats> {
        let conn = self.db.lock();

        let patients: i64 = conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE created_by = ?1",
            params![owner.to_string()],
            |row| row.get(0),
        )?;

        Ok(ProfileStats {
            patients: patients.max(0) as u64,
            doctors: count_linked::<Doctor>(&conn, owner, scope)?,
            hospitals: count_linked::<Hospital>(&conn, owner, scope)?,
            illnesses: count_linked::<Illness>(&conn, owner, scope)?,
        })
    }
}
