//! Subcommand handlers; each prints a plain-text report to stdout.

use anyhow::{Context, Result};
use appointmate_core::{
    Appointment, AppointmentStatus, BookRequest, BookingService, CalendarPolicy, DiscardSink,
    RescheduleRequest, SqliteAppointmentRepository,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::info;
use rusqlite::Connection;
use uuid::Uuid;

pub type Service<'conn> = BookingService<SqliteAppointmentRepository<'conn>, DiscardSink>;

pub fn service(conn: &mut Connection, policy: CalendarPolicy) -> Result<Service<'_>> {
    let repo = SqliteAppointmentRepository::try_new(conn)
        .context("database is not an appointment store")?;
    Ok(BookingService::new(repo, policy, DiscardSink))
}

pub fn slots(service: &Service<'_>, date: NaiveDate) -> Result<()> {
    let slots = service.list_slots(date)?;
    if slots.is_empty() {
        println!("No free slots on {date}.");
        return Ok(());
    }
    println!("Free slots on {date}:");
    for slot in slots {
        println!(
            "  {} - {}",
            slot.start.format("%H:%M"),
            slot.end().format("%H:%M")
        );
    }
    Ok(())
}

pub fn schedule(service: &Service<'_>, date: NaiveDate) -> Result<()> {
    let appointments = service.schedule_for(date)?;
    if appointments.is_empty() {
        println!("No appointments on {date}.");
        return Ok(());
    }
    println!("Appointments on {date}:");
    for appointment in &appointments {
        print_appointment(appointment);
    }
    Ok(())
}

pub fn book(
    service: &mut Service<'_>,
    client_name: String,
    client_email: Option<String>,
    date: NaiveDate,
    start: NaiveTime,
    not_before: Option<NaiveDateTime>,
) -> Result<()> {
    let appointment = service.book(&BookRequest {
        client_name,
        client_email,
        date,
        start,
        not_before,
    })?;
    info!(
        "event=cli_book module=cli status=ok appointment_id={}",
        appointment.id
    );
    println!("Booked:");
    print_appointment(&appointment);
    Ok(())
}

pub fn reschedule(
    service: &mut Service<'_>,
    appointment_id: Uuid,
    new_date: NaiveDate,
    new_start: NaiveTime,
    not_before: Option<NaiveDateTime>,
) -> Result<()> {
    let appointment = service.reschedule(&RescheduleRequest {
        appointment_id,
        new_date,
        new_start,
        not_before,
    })?;
    println!("Rescheduled:");
    print_appointment(&appointment);
    Ok(())
}

pub fn cancel(service: &mut Service<'_>, id: Uuid) -> Result<()> {
    let appointment = service.cancel(id)?;
    println!("Cancelled:");
    print_appointment(&appointment);
    Ok(())
}

pub fn show(service: &Service<'_>, id: Uuid) -> Result<()> {
    let appointment = service
        .appointment(id)?
        .with_context(|| format!("appointment {id} not found"))?;
    print_appointment(&appointment);
    Ok(())
}

pub fn client(service: &Service<'_>, name: &str, at: Option<NaiveDateTime>) -> Result<()> {
    let appointments: Vec<Appointment> = match at {
        Some(start) => service
            .find_for_client_at(name, start)?
            .into_iter()
            .collect(),
        None => service.list_by_client(name)?,
    };
    if appointments.is_empty() {
        println!("No active appointments for {name}.");
        return Ok(());
    }
    for appointment in &appointments {
        print_appointment(appointment);
    }
    Ok(())
}

fn print_appointment(appointment: &Appointment) {
    let status = match appointment.status {
        AppointmentStatus::Active => "",
        AppointmentStatus::Cancelled => " [cancelled]",
    };
    let email = appointment
        .client_email
        .as_deref()
        .map(|email| format!(" <{email}>"))
        .unwrap_or_default();
    println!(
        "  {} {}-{}  {}{}{}  ({})",
        appointment.date(),
        appointment.start.format("%H:%M"),
        appointment.end().format("%H:%M"),
        appointment.client_name,
        email,
        status,
        appointment.id
    );
}
