use std::sync::Arc;

use tracing::{debug, info, instrument};
use validator::Validate;

use crate::access::AccessControl;
use crate::auth::UserInfo;
use crate::crypto::FieldEncryptor;
use crate::entities::{ConsultationView, CreateConsultationRequest, UpdateConsultationRequest};
use crate::errors::ServiceError;
use health_bridge_data::models::{AppointmentStatus, ConsultationNote, NewConsultationNote};
use health_bridge_data::repository::{AppointmentRepository, ConsultationRepository};

/// Provider-authored visit notes. Clinical text is encrypted before it
/// reaches the repository and decrypted on the way out.
#[derive(Clone)]
pub struct ConsultationService {
    notes: Arc<dyn ConsultationRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    access: AccessControl,
    encryptor: Arc<FieldEncryptor>,
}

impl ConsultationService {
    pub fn new(
        notes: Arc<dyn ConsultationRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        access: AccessControl,
        encryptor: Arc<FieldEncryptor>,
    ) -> Self {
        Self {
            notes,
            appointments,
            access,
            encryptor,
        }
    }

    fn decrypt(&self, note: ConsultationNote) -> Result<ConsultationView, ServiceError> {
        Ok(ConsultationView {
            notes: self.encryptor.decrypt(&note.notes_encrypted)?,
            diagnosis: self.encryptor.decrypt_optional(note.diagnosis_encrypted.as_deref())?,
            prescription: self.encryptor.decrypt_optional(note.prescription_encrypted.as_deref())?,
            id: note.id,
            appointment_id: note.appointment_id,
            provider_id: note.provider_id,
            patient_id: note.patient_id,
            follow_up_date: note.follow_up_date,
            created_at: note.created_at,
            updated_at: note.updated_at,
        })
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn create(
        &self,
        actor: &UserInfo,
        request: CreateConsultationRequest,
    ) -> Result<ConsultationView, ServiceError> {
        request.validate()?;

        let appointment = self
            .appointments
            .find_by_id(&request.appointment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Appointment", &request.appointment_id))?;
        if appointment.provider_id != actor.user_id {
            return Err(ServiceError::Forbidden(
                "Only the appointment's provider can write consultation notes".to_string(),
            ));
        }
        if !matches!(appointment.status, AppointmentStatus::Confirmed | AppointmentStatus::Completed) {
            return Err(ServiceError::Conflict(format!(
                "Consultation notes need a confirmed or completed appointment, not {}",
                appointment.status
            )));
        }

        let note = self
            .notes
            .create(NewConsultationNote {
                appointment_id: appointment.id.clone(),
                provider_id: appointment.provider_id.clone(),
                patient_id: appointment.patient_id.clone(),
                notes_encrypted: self.encryptor.encrypt(&request.notes)?,
                diagnosis_encrypted: self.encryptor.encrypt_optional(request.diagnosis.as_deref())?,
                prescription_encrypted: self.encryptor.encrypt_optional(request.prescription.as_deref())?,
                follow_up_date: request.follow_up_date,
            })
            .await?;

        info!("Consultation note {} recorded for appointment {}", note.id, appointment.id);
        self.decrypt(note)
    }

    pub async fn get(&self, actor: &UserInfo, id: &str) -> Result<ConsultationView, ServiceError> {
        let note = self
            .notes
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Consultation note", id))?;
        self.access.ensure_patient_data(actor, &note.patient_id).await?;
        self.decrypt(note)
    }

    pub async fn list_for_patient(&self, actor: &UserInfo, patient_id: &str) -> Result<Vec<ConsultationView>, ServiceError> {
        self.access.ensure_patient_data(actor, patient_id).await?;
        let notes = self.notes.list_by_patient(patient_id).await?;
        debug!("Loaded {} consultation notes for patient {}", notes.len(), patient_id);
        notes.into_iter().map(|note| self.decrypt(note)).collect()
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn update(
        &self,
        actor: &UserInfo,
        id: &str,
        request: UpdateConsultationRequest,
    ) -> Result<ConsultationView, ServiceError> {
        request.validate()?;

        let mut note = self
            .notes
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Consultation note", id))?;
        if note.provider_id != actor.user_id {
            return Err(ServiceError::Forbidden(
                "Only the authoring provider can edit this note".to_string(),
            ));
        }

        if let Some(notes) = &request.notes {
            note.notes_encrypted = self.encryptor.encrypt(notes)?;
        }
        if let Some(diagnosis) = &request.diagnosis {
            note.diagnosis_encrypted = Some(self.encryptor.encrypt(diagnosis)?);
        }
        if let Some(prescription) = &request.prescription {
            note.prescription_encrypted = Some(self.encryptor.encrypt(prescription)?);
        }
        if request.follow_up_date.is_some() {
            note.follow_up_date = request.follow_up_date;
        }

        let updated = self.notes.update(&note).await?;
        self.decrypt(updated)
    }
}
