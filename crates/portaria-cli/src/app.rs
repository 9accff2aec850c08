//! Console menu state machine.
//!
//! Reads one answer per line from `input` and writes prompts and results to
//! `out`. End of input behaves like choosing "Sair".

use std::io::{BufRead, Write};

use chrono::{DateTime, Local, Utc};
use portaria_core::{
  Error, PresenceEngine, validate,
  identity::IdentityNumber,
  record::{Category, NO_UNIT, Record, Registration, format_stay},
  store::RegistrationStore,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Menu ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
  Main,
  Registration,
  Reports,
}

/// Prompt wording for one registration category.
struct Prompts {
  name:  &'static str,
  block: &'static str,
  /// `None` for roles without an apartment; the unit is recorded as `N/A`.
  unit:  Option<&'static str>,
}

fn prompts(category: Category) -> Prompts {
  match category {
    Category::Resident => Prompts {
      name:  "Digite o nome do morador: ",
      block: "Digite o bloco do morador: ",
      unit:  Some("Digite o apartamento do morador: "),
    },
    Category::Visitor => Prompts {
      name:  "Digite o nome do visitante: ",
      block: "Digite o bloco visitado: ",
      unit:  Some("Digite o apartamento visitado: "),
    },
    Category::Employee => Prompts {
      name:  "Digite o nome do funcionário: ",
      block: "Digite o bloco onde ele trabalha: ",
      unit:  None,
    },
    Category::DeliveryAgent => Prompts {
      name:  "Digite o nome do entregador: ",
      block: "Digite o bloco da entrega: ",
      unit:  Some("Digite o apartamento da entrega: "),
    },
    Category::ServiceProvider => Prompts {
      name:  "Digite o nome do prestador de serviço: ",
      block: "Digite o bloco atendido: ",
      unit:  Some("Digite o apartamento atendido: "),
    },
  }
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level console state.
pub struct App<S, R, W> {
  engine: PresenceEngine<S>,
  input:  R,
  out:    W,
  menu:   Menu,
}

impl<S, R, W> App<S, R, W>
where
  S: RegistrationStore,
  R: BufRead,
  W: Write,
{
  pub fn new(engine: PresenceEngine<S>, input: R, out: W) -> Self {
    Self { engine, input, out, menu: Menu::Main }
  }

  pub fn into_engine(self) -> PresenceEngine<S> { self.engine }

  /// Drive the menus until the operator leaves or input ends.
  pub async fn run(&mut self) -> anyhow::Result<()> {
    loop {
      let keep_going = match self.menu {
        Menu::Main => self.main_menu().await?,
        Menu::Registration => self.registration_menu().await?,
        Menu::Reports => self.reports_menu().await?,
      };
      if !keep_going {
        writeln!(self.out, "Saindo do sistema. Até mais!")?;
        return Ok(());
      }
    }
  }

  // ── Input helpers ─────────────────────────────────────────────────────────

  /// Print `label` and read one trimmed line. `None` at end of input.
  fn prompt(&mut self, label: &str) -> anyhow::Result<Option<String>> {
    write!(self.out, "{label}")?;
    self.out.flush()?;
    let mut line = String::new();
    if self.input.read_line(&mut line)? == 0 {
      writeln!(self.out)?;
      return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
  }

  /// Ask for an identity number until a valid one is typed.
  fn prompt_identity(&mut self) -> anyhow::Result<Option<String>> {
    loop {
      let Some(raw) = self.prompt("Digite o CPF: ")? else {
        return Ok(None);
      };
      if validate(&raw) {
        return Ok(Some(raw));
      }
      writeln!(
        self.out,
        "CPF inválido! Certifique-se de que ele contenha exatamente 11 números e seja válido."
      )?;
    }
  }

  // ── Menus ─────────────────────────────────────────────────────────────────

  async fn main_menu(&mut self) -> anyhow::Result<bool> {
    writeln!(self.out, "\n--- Sistema Portaria ---")?;
    writeln!(self.out, "1. Menu de Cadastro")?;
    writeln!(self.out, "2. Menu de Relatórios")?;
    writeln!(self.out, "3. Registrar saída de visitante")?;
    writeln!(self.out, "4. Sair")?;
    let Some(choice) = self.prompt("Escolha uma opção: ")? else {
      return Ok(false);
    };

    match choice.as_str() {
      "1" => self.menu = Menu::Registration,
      "2" => self.menu = Menu::Reports,
      "3" => return self.check_out().await,
      "4" => return Ok(false),
      _ => writeln!(self.out, "Opção inválida. Tente novamente.")?,
    }
    Ok(true)
  }

  async fn registration_menu(&mut self) -> anyhow::Result<bool> {
    writeln!(self.out, "\n--- Menu de Cadastro ---")?;
    writeln!(self.out, "1. Cadastrar morador")?;
    writeln!(self.out, "2. Cadastrar visitante")?;
    writeln!(self.out, "3. Cadastrar funcionário")?;
    writeln!(self.out, "4. Cadastrar entregador")?;
    writeln!(self.out, "5. Cadastrar prestador de serviço")?;
    writeln!(self.out, "6. Retornar ao menu principal")?;
    let Some(choice) = self.prompt("Escolha uma opção: ")? else {
      return Ok(false);
    };

    match menu_category(&choice) {
      Some(category) => self.register(category).await,
      None if choice == "6" => {
        writeln!(self.out, "Retornando ao menu principal...")?;
        self.menu = Menu::Main;
        Ok(true)
      }
      None => {
        writeln!(self.out, "Opção inválida. Tente novamente.")?;
        Ok(true)
      }
    }
  }

  async fn reports_menu(&mut self) -> anyhow::Result<bool> {
    writeln!(self.out, "\n--- Menu de Relatórios ---")?;
    writeln!(self.out, "1. Listar moradores")?;
    writeln!(self.out, "2. Listar visitantes")?;
    writeln!(self.out, "3. Listar funcionários")?;
    writeln!(self.out, "4. Listar entregadores")?;
    writeln!(self.out, "5. Listar prestadores de serviço")?;
    writeln!(self.out, "6. Listar todos os cadastros")?;
    writeln!(self.out, "7. Retornar ao menu principal")?;
    let Some(choice) = self.prompt("Escolha uma opção: ")? else {
      return Ok(false);
    };

    match (menu_category(&choice), choice.as_str()) {
      (Some(category), _) => self.report(Some(category)).await?,
      (None, "6") => self.report(None).await?,
      (None, "7") => {
        writeln!(self.out, "Retornando ao menu principal...")?;
        self.menu = Menu::Main;
      }
      _ => writeln!(self.out, "Opção inválida. Tente novamente.")?,
    }
    Ok(true)
  }

  // ── Operations ────────────────────────────────────────────────────────────

  async fn register(&mut self, category: Category) -> anyhow::Result<bool> {
    let p = prompts(category);
    let Some(name) = self.prompt(p.name)? else { return Ok(false) };
    let Some(block) = self.prompt(p.block)? else { return Ok(false) };
    let unit = match p.unit {
      Some(label) => match self.prompt(label)? {
        Some(unit) => unit,
        None => return Ok(false),
      },
      None => NO_UNIT.to_owned(),
    };
    let Some(identity_number) = self.prompt_identity()? else {
      return Ok(false);
    };

    // Report a known CPF before asking about the vehicle; the engine checks
    // again on register.
    let parsed = IdentityNumber::parse(&identity_number)?;
    match self.engine.lookup(&parsed).await {
      Ok(None) => {}
      Ok(Some(_)) => {
        writeln!(self.out, "Já existe uma pessoa cadastrada com este CPF!")?;
        return Ok(true);
      }
      Err(e) => {
        tracing::error!(error = %e, "lookup failed");
        writeln!(self.out, "Erro no banco de dados: {e}")?;
        return Ok(true);
      }
    }

    let Some(answer) = self.prompt(&format!("{name} possui um carro? (sim/não): "))? else {
      return Ok(false);
    };
    let has_vehicle = matches!(answer.to_lowercase().as_str(), "sim" | "s");
    let plate = if has_vehicle {
      match self.prompt("Digite a placa do carro (ex.: ABC-1234): ")? {
        Some(plate) => Some(plate),
        None => return Ok(false),
      }
    } else {
      None
    };

    let registration = Registration {
      name,
      identity_number,
      block,
      unit,
      category,
      has_vehicle,
      plate,
    };

    match self.engine.register(registration).await {
      Ok(r) => {
        let at = local_time(r.check_in_at);
        writeln!(
          self.out,
          "Horário de cadastro registrado para {} {}: {at}",
          category.label(),
          r.name
        )?;
        writeln!(
          self.out,
          "{} cadastrado(a): {}, CPF {}, Bloco {}, Apto {}, Placa: {}, Horário: {at}",
          capitalize(category.label()),
          r.name,
          r.identity_number.formatted(),
          r.block,
          r.unit,
          r.plate.as_deref().unwrap_or("Nenhum carro"),
        )?;
      }
      Err(Error::DuplicateIdentity(_)) => {
        writeln!(self.out, "Já existe uma pessoa cadastrada com este CPF!")?;
      }
      Err(Error::EmptyField(field)) => {
        writeln!(self.out, "Campo obrigatório vazio: {field}. Cadastro cancelado.")?;
      }
      Err(e) => {
        tracing::error!(error = %e, "registration failed");
        writeln!(self.out, "Erro no banco de dados: {e}")?;
      }
    }
    Ok(true)
  }

  async fn check_out(&mut self) -> anyhow::Result<bool> {
    let Some(raw) = self.prompt("Digite o CPF do visitante: ")? else {
      return Ok(false);
    };

    match self.engine.check_out(&raw).await {
      Ok(r) => {
        let out_at = r.check_out_at.map(local_time).unwrap_or_default();
        let stay = r.duration.map(format_stay).unwrap_or_default();
        writeln!(
          self.out,
          "Saída registrada para o visitante de CPF {} às {out_at}.",
          r.identity_number.formatted()
        )?;
        writeln!(self.out, "Tempo de permanência: {stay}.")?;
      }
      Err(Error::NotFound(_) | Error::InvalidIdentity(_)) => {
        writeln!(
          self.out,
          "CPF não encontrado ou o visitante não possui registro de entrada."
        )?;
      }
      Err(e) => {
        tracing::error!(error = %e, "check-out failed");
        writeln!(self.out, "Erro no banco de dados: {e}")?;
      }
    }
    Ok(true)
  }

  async fn report(&mut self, category: Option<Category>) -> anyhow::Result<()> {
    let records = match self.engine.list_records(category).await {
      Ok(records) => records,
      Err(e) => {
        tracing::error!(error = %e, "listing failed");
        writeln!(self.out, "Erro ao listar cadastros: {e}")?;
        return Ok(());
      }
    };

    if records.is_empty() {
      writeln!(
        self.out,
        "Nenhum cadastro encontrado para {}.",
        category.map_or("todos", Category::label)
      )?;
      return Ok(());
    }

    let title = category.map_or_else(|| "Todos os Cadastros".to_owned(), |c| capitalize(c.label()));
    writeln!(self.out, "\n--- {title} ---")?;
    for r in &records {
      writeln!(self.out, "{}", report_line(r, category.is_none()))?;
    }
    Ok(())
  }
}

// ─── Formatting ───────────────────────────────────────────────────────────────

/// Registration and report menus share numbering for the five categories.
fn menu_category(choice: &str) -> Option<Category> {
  match choice {
    "1" => Some(Category::Resident),
    "2" => Some(Category::Visitor),
    "3" => Some(Category::Employee),
    "4" => Some(Category::DeliveryAgent),
    "5" => Some(Category::ServiceProvider),
    _ => None,
  }
}

fn report_line(r: &Record, with_category: bool) -> String {
  let mut line = format!(
    "{} -> Bloco {}, Apto {}, CPF {}, Placa: {}",
    r.name,
    r.block,
    r.unit,
    r.identity_number.formatted(),
    r.plate.as_deref().unwrap_or("Nenhum carro"),
  );
  if with_category {
    line.push_str(&format!(", Tipo: {}", r.category.label()));
  }
  line.push_str(&format!(", Horário: {}", local_time(r.check_in_at)));
  if let (Some(out_at), Some(stay)) = (r.check_out_at, r.duration) {
    line.push_str(&format!(
      ", Saída: {}, Permanência: {}",
      local_time(out_at),
      format_stay(stay)
    ));
  }
  line
}

fn local_time(at: DateTime<Utc>) -> String { at.with_timezone(&Local).format(TIME_FORMAT).to_string() }

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use portaria_store_sqlite::SqliteStore;

  use super::*;

  /// Run the console over `script` against `engine`, returning its output.
  async fn run_script(engine: PresenceEngine<SqliteStore>, script: &str) -> (String, PresenceEngine<SqliteStore>) {
    let mut out = Vec::new();
    let mut app = App::new(engine, script.as_bytes(), &mut out);
    app.run().await.unwrap();
    let engine = app.into_engine();
    (String::from_utf8(out).unwrap(), engine)
  }

  async fn engine() -> PresenceEngine<SqliteStore> {
    PresenceEngine::new(SqliteStore::open_in_memory().await.unwrap())
  }

  const ANA: &str = "1\n2\nAna\nA\n101\n111.444.777-35\nnão\n6\n";

  #[tokio::test]
  async fn registers_visitor_after_reprompting_for_identity() {
    let script = "1\n2\nAna\nA\n101\n123\n111.111.111-11\n111.444.777-35\nsim\nabc-1234\n6\n4\n";
    let (out, engine) = run_script(engine().await, script).await;

    assert_eq!(out.matches("CPF inválido!").count(), 2, "{out}");
    assert!(out.contains("Visitante cadastrado(a): Ana, CPF 111.444.777-35, Bloco A, Apto 101, Placa: ABC-1234"), "{out}");
    assert!(out.ends_with("Saindo do sistema. Até mais!\n"));

    let records = engine.list_records(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].category, Category::Visitor);
  }

  #[tokio::test]
  async fn employee_gets_no_unit_prompt_and_no_plate() {
    let script = "1\n3\nCarlos\nB\n529.982.247-25\nnao\n6\n4\n";
    let (out, engine) = run_script(engine().await, script).await;

    assert!(!out.contains("apartamento"), "{out}");
    assert!(out.contains("Apto N/A, Placa: Nenhum carro"), "{out}");

    let carlos = engine.list_records(Some(Category::Employee)).await.unwrap().remove(0);
    assert_eq!(carlos.unit, NO_UNIT);
    assert!(carlos.plate.is_none());
  }

  #[tokio::test]
  async fn duplicate_is_reported_before_the_vehicle_question() {
    let script = format!("{ANA}1\n1\nOutra\nB\n202\n11144477735\n6\n4\n");
    let (out, engine) = run_script(engine().await, &script).await;

    assert!(out.contains("Já existe uma pessoa cadastrada com este CPF!"), "{out}");
    assert_eq!(out.matches("possui um carro?").count(), 1, "{out}");
    assert_eq!(engine.list_records(None).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn visitor_check_out_reports_stay_once() {
    let script = format!("{ANA}3\n111.444.777-35\n3\n111.444.777-35\n4\n");
    let (out, engine) = run_script(engine().await, &script).await;

    assert!(out.contains("Saída registrada para o visitante de CPF 111.444.777-35"), "{out}");
    assert!(out.contains("Tempo de permanência: 0:00:00."), "{out}");
    assert_eq!(
      out
        .matches("CPF não encontrado ou o visitante não possui registro de entrada.")
        .count(),
      1,
      "{out}"
    );

    let ana = engine.list_records(None).await.unwrap().remove(0);
    assert!(ana.check_out_at.is_some());
  }

  #[tokio::test]
  async fn check_out_of_unknown_identity_is_not_found() {
    let (out, _) = run_script(engine().await, "3\n529.982.247-25\n4\n").await;
    assert!(out.contains("CPF não encontrado ou o visitante não possui registro de entrada."));
  }

  #[tokio::test]
  async fn reports_list_by_category() {
    let script = format!("{ANA}2\n1\n2\n6\n7\n4\n");
    let (out, _) = run_script(engine().await, &script).await;

    assert!(out.contains("Nenhum cadastro encontrado para morador."), "{out}");
    assert!(out.contains("--- Visitante ---"), "{out}");
    assert!(out.contains("Ana -> Bloco A, Apto 101, CPF 111.444.777-35, Placa: Nenhum carro, Horário: "), "{out}");
    assert!(out.contains("--- Todos os Cadastros ---"), "{out}");
    assert!(out.contains("Tipo: visitante"), "{out}");
  }

  /// Store whose every call fails, as if the database file went away.
  struct BrokenStore;

  fn broken() -> Error { Error::store(std::io::Error::other("disk I/O error")) }

  impl RegistrationStore for BrokenStore {
    type Error = Error;

    async fn insert(&self, _: portaria_core::record::NewRecord) -> Result<Record, Error> { Err(broken()) }

    async fn find_by_identity(&self, _: &IdentityNumber) -> Result<Option<Record>, Error> {
      Err(broken())
    }

    async fn update_checkout(
      &self,
      _: &IdentityNumber,
      _: DateTime<Utc>,
      _: chrono::TimeDelta,
    ) -> Result<Record, Error> {
      Err(broken())
    }

    async fn list(&self, _: Option<Category>) -> Result<Vec<Record>, Error> { Err(broken()) }
  }

  #[tokio::test]
  async fn lookup_failure_is_reported_before_the_vehicle_question() {
    let mut out = Vec::new();
    let script = "1\n2\nAna\nA\n101\n111.444.777-35\n6\n4\n";
    App::new(PresenceEngine::new(BrokenStore), script.as_bytes(), &mut out)
      .run()
      .await
      .unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.contains("Erro no banco de dados: store error: disk I/O error"), "{out}");
    assert!(!out.contains("possui um carro?"), "{out}");
    assert!(!out.contains("cadastrado(a)"), "{out}");
  }

  #[tokio::test]
  async fn invalid_choice_and_end_of_input() {
    let (out, _) = run_script(engine().await, "9\n").await;
    assert!(out.contains("Opção inválida. Tente novamente."));
    assert!(out.ends_with("Saindo do sistema. Até mais!\n"));
  }

  #[test]
  fn capitalize_handles_accented_labels() {
    assert_eq!(capitalize("funcionário"), "Funcionário");
    assert_eq!(capitalize(""), "");
  }
}
