use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use heywork_sync::api::types::{AttendanceKind, Id};
use heywork_sync::api::WorkerClient;
use heywork_sync::cache::{CacheResult, CacheSource, FetchMode};
use heywork_sync::config::Config;
use heywork_sync::derive::facets::{self, SalaryBounds, SALARY_BARS};
use heywork_sync::derive::geo;
use heywork_sync::derive::lateness::{self, format_hms, LateTicker};
use heywork_sync::derive::schedule::{JobColors, ScheduleEntry};
use heywork_sync::live::{LiveChannel, LiveEvent, WsConnector};
use heywork_sync::logging;

#[derive(Parser, Debug)]
#[command(name = "heywork-sync")]
#[command(about = "Cache-and-sync client for the Hey! Work worker API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/heywork/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sign in; the password is read from HEYWORK_PASSWORD
  Login { email: String },
  /// Sign out and purge the cache
  Logout,
  /// List jobs
  Jobs {
    /// Skip the cache
    #[arg(short, long)]
    force: bool,
    /// Most popular jobs instead of all jobs
    #[arg(long)]
    popular: bool,
    /// Apply the saved search filters
    #[arg(long)]
    filtered: bool,
  },
  /// List applications with their job and hotel
  Applications {
    #[arg(short, long)]
    force: bool,
  },
  /// Attendance history grouped by job and day
  Attendance {
    #[arg(short, long)]
    force: bool,
  },
  /// Jobs on a day with attendance state
  Schedule {
    /// YYYY-MM-DD, defaults to today
    #[arg(short, long)]
    date: Option<NaiveDate>,
    /// Keep refreshing the lateness counter every second
    #[arg(long)]
    follow: bool,
  },
  /// Check in or out of a job scheduled today
  Attend {
    job_id: String,
    latitude: f64,
    longitude: f64,
    #[arg(long)]
    checkout: bool,
  },
  /// Show the skill board, optionally saving a new selection
  Skills {
    /// Comma separated skill ids to select and save
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,
  },
  /// Great-circle distance in meters
  Distance {
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
  },
  /// Follow live updates until interrupted
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  logging::init("heywork-sync");

  let args = Args::parse();

  if let Command::Distance {
    lat1,
    lon1,
    lat2,
    lon2,
  } = args.command
  {
    println!("{:.1} m", geo::distance_m(lat1, lon1, lat2, lon2));
    return Ok(());
  }

  let config = Config::load(args.config.as_deref())?;
  let client = WorkerClient::new(&config)?;

  match args.command {
    Command::Login { email } => {
      let password = Config::get_password()?;
      let session = client.login(&email, &password).await?;
      match session.expires_at {
        Some(at) => println!("Logged in until {}", at.with_timezone(&Local)),
        None => println!("Logged in"),
      }
    }
    Command::Logout => {
      client.logout().await?;
      println!("Logged out");
    }
    Command::Jobs {
      force,
      popular,
      filtered,
    } => {
      let mode = FetchMode::forced(force);
      let result = if popular {
        client.popular_jobs(mode).await
      } else if filtered {
        client.filtered_jobs(mode).await?
      } else {
        client.jobs(mode).await
      };
      report(&result);

      let counts = client.cache().application_counts()?;
      for job in &result.data {
        println!(
          "{:>6}  {:<24} {:<24} {:>10}  {} applicants",
          job.id,
          job.position.as_deref().unwrap_or("-"),
          job.hotel_name.as_deref().unwrap_or("-"),
          job.fee.as_deref().unwrap_or("-"),
          heywork_sync::resolve::count_for_job(&job.id, &counts),
        );
      }

      let categories = facets::categories(&result.data);
      if !categories.is_empty() {
        println!("\nCategories: {}", categories.join(", "));
      }
      if let Some(bounds) = SalaryBounds::from_jobs(&result.data) {
        print_histogram(&result.data, bounds);
      }
    }
    Command::Applications { force } => {
      let result = client.resolved_applications(FetchMode::forced(force)).await;
      report(&result);
      for resolved in &result.data {
        let app = &resolved.application;
        println!(
          "{:>6}  {:<10} {:<24} {}",
          app.application_id.as_ref().map(Id::as_str).unwrap_or("-"),
          String::from(app.status.clone()),
          resolved
            .job
            .as_ref()
            .and_then(|j| j.position.as_deref())
            .unwrap_or("(job not cached)"),
          resolved
            .hotel
            .as_ref()
            .and_then(|h| h.hotel_name.as_deref())
            .unwrap_or("(hotel not cached)"),
        );
      }
    }
    Command::Attendance { force } => {
      let result = client.attendance_groups(FetchMode::forced(force)).await;
      report(&result);
      let now = Local::now().naive_local();
      for group in &result.data {
        let ago = group
          .checkin
          .as_ref()
          .and_then(|c| lateness::parse_timestamp(&c.created_at))
          .map(|at| lateness::time_ago(at, now))
          .unwrap_or_default();
        println!(
          "{}  job {:>5}  {:<22} in {}  out {}  late {} min  {}",
          group.date,
          group.job_id,
          group.position.as_deref().unwrap_or("-"),
          heywork_sync::derive::attendance::clock_time(group.checkin.as_ref().map(|r| r.created_at.as_str())),
          heywork_sync::derive::attendance::clock_time(group.checkout.as_ref().map(|r| r.created_at.as_str())),
          group.late_minutes(),
          ago,
        );
      }
    }
    Command::Schedule { date, follow } => {
      let now = Local::now().naive_local();
      let date = date.unwrap_or(now.date());
      let result = client.schedule(date, now).await;
      report(&result);

      let colors = JobColors::assign(&client.cache().jobs()?);
      for entry in &result.data {
        print_entry(entry, colors.color(&entry.job.id), now);
      }

      if follow && !result.data.is_empty() {
        follow_lateness(result.data).await?;
      }
    }
    Command::Attend {
      job_id,
      latitude,
      longitude,
      checkout,
    } => {
      let now = Local::now().naive_local();
      let schedule = client.schedule(now.date(), now).await;
      let job_id = Id::new(job_id);
      let entry = schedule
        .data
        .iter()
        .find(|e| e.job.id == job_id)
        .ok_or_else(|| eyre!("Job {} is not scheduled today", job_id))?;
      client.select_job(&entry.job)?;

      let kind = if checkout {
        AttendanceKind::Checkout
      } else {
        AttendanceKind::Checkin
      };
      if kind == AttendanceKind::Checkin && !entry.can_check_in(now) {
        return Err(eyre!("Check-in is not open for job {}", job_id));
      }

      client
        .submit_attendance(
          &entry.job,
          entry.application_id.as_ref(),
          kind,
          (latitude, longitude),
          None,
        )
        .await?;
      println!("{} recorded for job {}", kind.as_str(), job_id);
    }
    Command::Skills { select } => {
      let mut board = client.skill_board().await?;
      if !select.is_empty() {
        let ids: Vec<Id> = select.into_iter().map(Id::new).collect();
        board.apply_selection(&ids);
        client.save_skills(&mut board).await?;
        println!("Saved {} skills", board.selected_count());
      }
      for category in &board.categories {
        println!("{}", category.name);
        for item in &category.items {
          println!(
            "  [{}] {:>4} {}",
            if item.checked { "x" } else { " " },
            item.skill.id,
            item.skill.name
          );
        }
      }
    }
    Command::Watch => watch(&config, &client).await?,
    Command::Distance { .. } => {}
  }

  Ok(())
}

fn report<T>(result: &CacheResult<T>) {
  match result.source {
    CacheSource::Network | CacheSource::Cache => {}
    CacheSource::Offline => eprintln!(
      "offline, showing cached data: {}",
      result.error.as_deref().unwrap_or("unknown error")
    ),
    CacheSource::Unavailable => eprintln!(
      "unavailable: {}",
      result.error.as_deref().unwrap_or("unknown error")
    ),
    CacheSource::Unauthenticated => eprintln!("not logged in, run `heywork-sync login <email>`"),
  }
}

fn print_histogram(jobs: &[heywork_sync::api::types::Job], bounds: SalaryBounds) {
  let bars = facets::salary_histogram(jobs, bounds, SALARY_BARS);
  let line: String = bars
    .iter()
    .map(|&count| match count {
      0 => '.',
      1 => ':',
      _ => '#',
    })
    .collect();
  println!("Salary {:.0} [{}] {:.0}", bounds.min, line, bounds.max);
}

fn print_entry(entry: &ScheduleEntry, color: &str, now: chrono::NaiveDateTime) {
  println!(
    "{} {:>5}  {:<22} {}-{}  {:<14} {}{}",
    color,
    entry.job.id,
    entry.job.position.as_deref().unwrap_or("-"),
    entry.job.start_time.as_deref().unwrap_or("--"),
    entry.job.end_time.as_deref().unwrap_or("--"),
    entry.status().label(),
    entry.late_label(),
    if entry.can_check_in(now) {
      "  (check-in open)"
    } else {
      ""
    },
  );
}

/// Print the live lateness counter until interrupted.
async fn follow_lateness(entries: Vec<ScheduleEntry>) -> Result<()> {
  let ticker = LateTicker::start(move || {
    let now = Local::now().naive_local();
    entries
      .iter()
      .cloned()
      .map(|mut entry| {
        entry.refresh_lateness(now);
        entry
      })
      .collect::<Vec<_>>()
  });
  let mut updates = ticker.watch();

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      changed = updates.changed() => {
        if changed.is_err() {
          break;
        }
        let line: Vec<String> = updates
          .borrow()
          .iter()
          .filter(|e| e.late_seconds > 0)
          .map(|e| format!("{} late {}", e.job.id, format_hms(e.late_seconds)))
          .collect();
        if !line.is_empty() {
          println!("{}", line.join("  "));
        }
      }
    }
  }
  Ok(())
}

async fn watch(config: &Config, client: &WorkerClient) -> Result<()> {
  let channel = LiveChannel::new(
    config.api.ws_url.clone(),
    client.layer().clone(),
    Arc::new(WsConnector),
  )
  .with_reconnect_delay(config.sync.reconnect_delay());
  let mut events = channel.subscribe();
  let mut state = channel.state();

  channel.connect().await?;
  if !channel.is_running() {
    return Err(eyre!("Not logged in"));
  }

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      changed = state.changed() => {
        if changed.is_err() {
          break;
        }
        println!("channel {:?}", *state.borrow());
      }
      event = events.recv() => match event {
        Ok(LiveEvent::Connected { message }) => {
          println!("connected {}", message.unwrap_or_default());
        }
        Ok(event) => println!("{} received", event.kind()),
        Err(RecvError::Lagged(n)) => eprintln!("missed {} live events", n),
        Err(RecvError::Closed) => break,
      }
    }
  }

  channel.disconnect().await;
  Ok(())
}
