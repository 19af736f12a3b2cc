use chrono::NaiveTime;
use clap::Parser;
use dotenvy::dotenv;
use fake::faker::company::raw::Buzzword;
use fake::faker::name::raw::{FirstName, LastName};
use fake::locales::EN;
use fake::Fake;
use rand::Rng;
use routine::{
    config::{AppState, PgRoutineService},
    models::registry_model::{room_add, sections_add, subject_add, teacher_add, RoomForm, SubjectForm, TeacherForm},
    models::routine_model::written_ids,
    models::timeslot_model::TimeslotForm,
};
use scheduler::elective::ElectiveProjector;
use scheduler::{
    AllocationOutcome, AllocationRequest, ClassDetails, ClassType, Day, ElectiveRequest, GroupDetails,
    LabGroupMode, LabSplitRequest, SectionKey, SingleSlotRequest, SlotId, SpannedRequest, TimeSlotCalendar,
};
use sqlx::{Pool, Postgres};
use std::error::Error;
use std::path::PathBuf;

const PROGRAM: &str = "BCT";
const SEMESTERS: [u8; 3] = [5, 7, 8];
const SECTIONS: [&str; 2] = ["AB", "CD"];

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not read {}: {1}", .0.display())]
    Io(PathBuf, std::io::Error),
    #[error("could not parse {}: {1}", .0.display())]
    Json(PathBuf, serde_json::Error),
    #[error("{0}")]
    Args(String),
}

/// Fills the routine database with demo data, or imports a file of allocation requests.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON array of allocation requests to commit instead of generated ones
    #[arg(long)]
    import: Option<PathBuf>,

    /// Number of teachers
    #[arg(long, default_value = "12")]
    teachers: u32,

    /// Number of rooms
    #[arg(long, default_value = "8")]
    rooms: u32,

    /// Number of teaching slots per day; a break is added halfway
    #[arg(long, default_value = "6")]
    slots: u32,

    /// Number of generated allocation requests
    #[arg(long, default_value = "40")]
    requests: u32,

    /// Commit requests even when they conflict with what is already stored
    #[arg(long)]
    override_conflicts: bool,
}

impl Cli {
    fn validate(&self) -> Result<(), CliError> {
        if self.teachers < 2 || self.rooms < 2 {
            return Err(CliError::Args(String::from("Need at least 2 teachers and 2 rooms")));
        }
        if self.slots < 2 {
            return Err(CliError::Args(String::from("Need at least 2 teaching slots")));
        }
        Ok(())
    }

    async fn read_import(&self) -> Result<Option<Vec<AllocationRequest>>, CliError> {
        let Some(path) = &self.import else {
            return Ok(None);
        };
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CliError::Io(path.clone(), e))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| CliError::Json(path.clone(), e))
    }
}

/// Registry ids the generated requests draw from.
struct Catalog {
    subjects: Vec<i32>,
    teachers: Vec<i32>,
    rooms: Vec<i32>,
}

#[derive(Debug, Default)]
struct Summary {
    committed: usize,
    rows: usize,
    needs_confirmation: usize,
    failed: usize,
}

#[tokio::main]
async fn main() {
    // load env vars
    dotenv().ok();

    let cli = Cli::parse();
    if let Err(err) = cli.validate() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
    let imported = match cli.read_import().await {
        Ok(imported) => imported,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    match run(&cli, imported).await {
        Ok(summary) => {
            println!("Committed: {} requests, {} rows", summary.committed, summary.rows);
            println!("Needs confirmation: {}", summary.needs_confirmation);
            println!("Failed: {}", summary.failed);
        }
        Err(err) => {
            eprintln!("Error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli, imported: Option<Vec<AllocationRequest>>) -> Result<Summary, Box<dyn Error>> {
    let app_state = AppState::new().await?;
    let service = &app_state.service;

    let requests = match imported {
        Some(requests) => {
            println!("Importing {} requests", requests.len());
            requests
        }
        None => {
            println!("Using parameters:");
            println!("Teachers: {}", cli.teachers);
            println!("Rooms: {}", cli.rooms);
            println!("Slots: {}", cli.slots);
            println!("Requests: {}", cli.requests);

            let db_pool = &app_state.routine_data.routine_db;
            let catalog = generate_catalog(db_pool, cli)
                .await
                .map_err(|e| e as Box<dyn Error>)?;
            let calendar = generate_timeslots(service, cli.slots).await?;
            generate_requests(&catalog, &calendar, cli.requests)
        }
    };

    let mut summary = Summary::default();
    for (index, result) in service
        .commit_batch(&requests, cli.override_conflicts)
        .await
        .into_iter()
        .enumerate()
    {
        match result {
            Ok(outcome @ AllocationOutcome::Committed { .. }) => {
                summary.committed += 1;
                summary.rows += written_ids(&outcome).len();
            }
            Ok(AllocationOutcome::NeedsConfirmation { conflicts }) => {
                summary.needs_confirmation += 1;
                if let Some(first) = conflicts.first() {
                    println!("Request {index}: {first}");
                }
            }
            Err(err) => {
                summary.failed += 1;
                println!("Request {index} failed: {err}");
            }
        }
    }

    let double_bookings = service.audit().await?;
    println!("Double bookings in the routine: {}", double_bookings.len());
    Ok(summary)
}

async fn generate_catalog(db_pool: &Pool<Postgres>, cli: &Cli) -> Result<Catalog, Box<dyn Error + Send + Sync>> {
    let sections: Vec<String> = SECTIONS.iter().map(ToString::to_string).collect();
    for semester in SEMESTERS {
        sections_add(db_pool, PROGRAM, semester, &sections).await?;
    }

    let mut teachers = Vec::with_capacity(cli.teachers as usize);
    for i in 1..=cli.teachers {
        let first: String = FirstName(EN).fake();
        let last: String = LastName(EN).fake();
        let teacher = TeacherForm {
            name: format!("{first} {last}"),
            email: Some(format!("teacher{i}@routine.example.edu")),
        };
        teachers.push(teacher_add(db_pool, &teacher).await?);
    }

    // One subject per teacher keeps the demo routine readable.
    let mut subjects = Vec::with_capacity(cli.teachers as usize);
    for i in 1..=cli.teachers {
        let word: String = Buzzword(EN).fake();
        let subject = SubjectForm {
            code: format!("CT{:03}", 600 + i),
            name: format!("Applied {word}"),
        };
        subjects.push(subject_add(db_pool, &subject).await?);
    }

    let mut rooms = Vec::with_capacity(cli.rooms as usize);
    for i in 1..=cli.rooms {
        let room = RoomForm {
            name: format!("Room {i}"),
            capacity: 48,
        };
        rooms.push(room_add(db_pool, &room).await?);
    }

    Ok(Catalog {
        subjects,
        teachers,
        rooms,
    })
}

/// Adds 50 minute slots from 08:00 with a 30 minute break halfway, unless a
/// calendar already exists.
async fn generate_timeslots(service: &PgRoutineService, slots: u32) -> Result<TimeSlotCalendar, Box<dyn Error>> {
    let calendar = service.calendar().await?;
    if !calendar.is_empty() {
        println!("Keeping the existing calendar of {} slots", calendar.len());
        return Ok(calendar);
    }

    let mut start_time = NaiveTime::parse_from_str("08:00", "%H:%M")?;
    let mut sort_order = 10;
    for i in 0..slots {
        if i == slots / 2 {
            let lunch = TimeslotForm {
                start_time: start_time.format("%H:%M").to_string(),
                duration: 30,
                sort_order,
                is_break: true,
            };
            service.add_time_slot(lunch.to_time_slot()?).await?;
            start_time += chrono::Duration::minutes(30);
            sort_order += 10;
        }
        let period = TimeslotForm {
            start_time: start_time.format("%H:%M").to_string(),
            duration: 50,
            sort_order,
            is_break: false,
        };
        service.add_time_slot(period.to_time_slot()?).await?;
        start_time += chrono::Duration::minutes(50);
        sort_order += 10;
    }

    Ok(service.calendar().await?)
}

fn pick<T: Copy>(rng: &mut impl Rng, items: &[T]) -> T {
    items[rng.random_range(0..items.len())]
}

/// A random mix of lectures, spanned practicals, two-group labs and electives.
fn generate_requests(catalog: &Catalog, calendar: &TimeSlotCalendar, count: u32) -> Vec<AllocationRequest> {
    let teaching: Vec<SlotId> = calendar.teaching_slots().map(|slot| slot.id).collect();
    let pairs: Vec<[SlotId; 2]> = calendar
        .slots()
        .windows(2)
        .filter(|pair| !pair[0].is_break && !pair[1].is_break)
        .map(|pair| [pair[0].id, pair[1].id])
        .collect();
    if teaching.is_empty() {
        return Vec::new();
    }

    let mut rng = rand::rng();
    let mut requests = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let semester = pick(&mut rng, &SEMESTERS);
        let section = SectionKey::new(PROGRAM, semester, pick(&mut rng, &SECTIONS));
        let day = pick(&mut rng, &Day::ALL);
        let class = |rng: &mut rand::rngs::ThreadRng, class_type: ClassType| {
            ClassDetails::new(class_type)
                .with_subject(pick(rng, &catalog.subjects))
                .with_teachers(&[pick(rng, &catalog.teachers)])
                .with_room(pick(rng, &catalog.rooms))
        };
        let group = |rng: &mut rand::rngs::ThreadRng| {
            GroupDetails::new(
                pick(rng, &catalog.subjects),
                &[pick(rng, &catalog.teachers)],
                pick(rng, &catalog.rooms),
            )
        };

        let roll = rng.random_range(0..100);
        let request = match roll {
            0..60 => {
                let class_type = if rng.random_bool(0.8) { ClassType::Lecture } else { ClassType::Tutorial };
                AllocationRequest::Single(SingleSlotRequest {
                    section,
                    day,
                    slot_id: pick(&mut rng, &teaching),
                    class: class(&mut rng, class_type),
                })
            }
            60..75 if !pairs.is_empty() => AllocationRequest::Spanned(SpannedRequest {
                section,
                day,
                slot_ids: pick(&mut rng, &pairs).to_vec(),
                class: class(&mut rng, ClassType::Practical),
            }),
            75..90 => AllocationRequest::LabSplit(LabSplitRequest {
                section,
                day,
                slot_ids: vec![pick(&mut rng, &teaching)],
                mode: LabGroupMode::BothGroups,
                group_a: Some(group(&mut rng)),
                group_b: Some(group(&mut rng)),
                notes: String::new(),
            }),
            _ => {
                let semester = pick(&mut rng, &[7, 8]);
                AllocationRequest::Elective(ElectiveRequest {
                    program_code: PROGRAM.to_string(),
                    semester,
                    day,
                    slot_ids: vec![pick(&mut rng, &teaching)],
                    elective_number: pick(&mut rng, ElectiveProjector::allowed_numbers(semester)),
                    elective_type: Some("technical".to_string()),
                    label: None,
                    target_sections: None,
                    class: class(&mut rng, ClassType::Lecture),
                })
            }
        };
        requests.push(request);
    }
    requests
}
