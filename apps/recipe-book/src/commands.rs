//! Command execution and output rendering

use std::{
    io::{BufRead, BufReader, Write},
    sync::Arc,
};

use anyhow::{bail, Context};
use catalog::{
    CategoryChoice, DetailEditor, PhotoEncoder, Projection, RecipeCard, RecipeCollectionStore,
    RecipeDetail, SortKey, UNCATEGORIZED_LABEL,
};
use entities::{LogId, RecipeDraft, RecipeId};
use serde::Serialize;

use crate::cli::{AddArgs, Command, EditArgs, ListArgs, LogArgs};

/// Runs commands against a recipe collection.
pub struct App {
    store: Arc<RecipeCollectionStore>,
    editor: DetailEditor,
    default_sort: SortKey,
    json: bool,
    // Answers to delete confirmations.
    input: Box<dyn BufRead + Send>,
}

impl App {
    pub fn new(
        store: Arc<RecipeCollectionStore>,
        encoder: Arc<dyn PhotoEncoder>,
        default_sort: SortKey,
        json: bool,
    ) -> Self {
        let editor = DetailEditor::new(Arc::clone(&store), encoder);
        Self {
            store,
            editor,
            default_sort,
            json,
            input: Box::new(BufReader::new(std::io::stdin())),
        }
    }

    /// Reads confirmation answers from `input` instead of stdin.
    pub fn with_input(mut self, input: impl BufRead + Send + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub async fn run<W: Write>(&mut self, command: Command, out: &mut W) -> anyhow::Result<()> {
        match command {
            Command::List(args) => self.list(args, out).await,
            Command::Add(args) => self.add(args, out).await,
            Command::Show { id } => {
                let detail = self.editor.open(&RecipeId::new(id)).await?;
                self.editor.close();
                self.emit_detail(&detail, out)
            }
            Command::Rate { id, stars } => {
                self.editor.open(&RecipeId::new(id)).await?;
                let detail = self.editor.select_rating(stars).await?;
                self.editor.close();
                self.emit_detail(&detail, out)
            }
            Command::Cooked { id, unset } => {
                self.editor.open(&RecipeId::new(id)).await?;
                let detail = self.editor.set_cooked(!unset).await?;
                self.editor.close();
                self.emit_detail(&detail, out)
            }
            Command::Edit(args) => self.edit(args, out).await,
            Command::Log(args) => self.log(args, out).await,
            Command::DeleteLog { id, log_id, yes } => {
                if !yes && !self.confirm("この記録を削除しますか？")? {
                    return self.cancelled(out);
                }
                self.delete_log(id, log_id, out).await
            }
            Command::Delete { id, yes } => {
                if !yes && !self.confirm("このレシピを削除しますか？")? {
                    return self.cancelled(out);
                }
                let id = RecipeId::new(id);
                self.store.delete(&id).await?;
                if self.json {
                    write_json(out, &serde_json::json!({ "deleted": id }))
                } else {
                    writeln!(out, "Deleted {id}")?;
                    Ok(())
                }
            }
            Command::Categories => {
                let categories = self.store.categories().await;
                if self.json {
                    return write_json(out, &categories);
                }
                for category in categories {
                    writeln!(out, "{category}")?;
                }
                Ok(())
            }
        }
    }

    async fn list<W: Write>(&self, args: ListArgs, out: &mut W) -> anyhow::Result<()> {
        let sort = args.sort.unwrap_or(self.default_sort);
        let projection = self.store.project(sort, &args.category).await;
        if self.json {
            return write_json(out, &projection);
        }
        render_projection(out, &projection)?;
        Ok(())
    }

    async fn add<W: Write>(&self, args: AddArgs, out: &mut W) -> anyhow::Result<()> {
        let mut draft = RecipeDraft::new(args.name, args.url);
        if let Some(category) = args.category {
            draft = draft.with_category(category);
        }
        let recipe = self.store.create(draft).await?;
        if self.json {
            return write_json(out, &recipe);
        }
        writeln!(out, "Added {}", recipe.id)?;
        render_card(out, &RecipeCard::from_recipe(&recipe))?;
        Ok(())
    }

    async fn edit<W: Write>(&mut self, args: EditArgs, out: &mut W) -> anyhow::Result<()> {
        let changes_something = args.name.is_some()
            || args.url.is_some()
            || args.category.is_some()
            || args.clear_category;
        if !changes_something {
            bail!("nothing to change; pass --name, --url, --category or --clear-category");
        }

        self.editor.open(&RecipeId::new(args.id)).await?;
        let known = self.store.categories().await;
        let buffer = self.editor.begin_edit().await?;
        if let Some(name) = args.name {
            buffer.name = name;
        }
        if let Some(url) = args.url {
            buffer.url = url;
        }
        if let Some(category) = args.category {
            buffer.category = CategoryChoice::for_category(Some(&category), &known);
        } else if args.clear_category {
            buffer.category = CategoryChoice::None;
        }

        let result = self.editor.save_edit().await;
        self.editor.close();
        self.emit_detail(&result?, out)
    }

    async fn log<W: Write>(&mut self, args: LogArgs, out: &mut W) -> anyhow::Result<()> {
        let photo = match &args.photo {
            Some(path) => Some(
                tokio::fs::read(path)
                    .await
                    .with_context(|| format!("failed to read photo {}", path.display()))?,
            ),
            None => None,
        };

        self.editor.open(&RecipeId::new(args.id)).await?;
        let form = match args.date {
            Some(date) => self.editor.begin_log_on(date)?,
            None => self.editor.begin_log()?,
        };
        if let Some(note) = args.note {
            form.note = note;
        }
        if let Some(raw) = photo {
            self.editor.attach_photo(&raw)?;
        }

        let result = self.editor.submit_log().await;
        self.editor.close();
        let entry = result?;

        if self.json {
            return write_json(out, &entry);
        }
        writeln!(
            out,
            "Logged {} (log {}){}",
            catalog::format_log_date(entry.date),
            entry.id,
            if entry.photo.is_some() { " with photo" } else { "" }
        )?;
        Ok(())
    }

    async fn delete_log<W: Write>(
        &mut self,
        id: String,
        log_id: LogId,
        out: &mut W,
    ) -> anyhow::Result<()> {
        self.editor.open(&RecipeId::new(id)).await?;
        let result = self.editor.delete_log(log_id).await;
        self.editor.close();
        result?;

        if self.json {
            return write_json(out, &serde_json::json!({ "deletedLog": log_id }));
        }
        writeln!(out, "Deleted log {log_id}")?;
        Ok(())
    }

    /// Asks on stderr and reads one line. Only "y" or "yes" confirms.
    fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
        eprint!("{question} [y/N] ");
        std::io::stderr().flush()?;
        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .context("failed to read confirmation")?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }

    fn cancelled<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        tracing::debug!("Deletion cancelled");
        if self.json {
            return write_json(out, &serde_json::json!({ "cancelled": true }));
        }
        writeln!(out, "Cancelled")?;
        Ok(())
    }

    fn emit_detail<W: Write>(&self, detail: &RecipeDetail, out: &mut W) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, detail);
        }
        render_detail(out, detail)?;
        Ok(())
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Renders a rating as filled and empty stars.
pub fn stars(filled: u8, empty: u8) -> String {
    "★".repeat(filled.into()) + &"☆".repeat(empty.into())
}

fn render_card<W: Write>(out: &mut W, card: &RecipeCard) -> std::io::Result<()> {
    writeln!(
        out,
        "{}  {}  {}  {} [{}] ({} logs)",
        card.id,
        stars(card.filled_stars, card.empty_stars),
        if card.cooked { "✓" } else { " " },
        card.name,
        card.category_label(UNCATEGORIZED_LABEL),
        card.log_count,
    )
}

fn render_projection<W: Write>(out: &mut W, projection: &Projection) -> std::io::Result<()> {
    writeln!(
        out,
        "{} recipes, {} cooked",
        projection.total_count, projection.cooked_count
    )?;
    if projection.is_empty() {
        writeln!(out, "No recipes")?;
    }
    for card in &projection.cards {
        render_card(out, card)?;
    }
    Ok(())
}

fn render_detail<W: Write>(out: &mut W, detail: &RecipeDetail) -> std::io::Result<()> {
    let (filled, empty) = detail.rating.stars();
    writeln!(out, "{}", detail.name)?;
    writeln!(out, "  id:       {}", detail.id)?;
    writeln!(out, "  url:      {}", detail.url)?;
    writeln!(out, "  category: {}", detail.category_label)?;
    if let Some(author) = &detail.author {
        writeln!(out, "  added by: {author}")?;
    }
    writeln!(out, "  rating:   {} ({})", stars(filled, empty), detail.rating)?;
    writeln!(out, "  cooked:   {}", if detail.cooked { "yes" } else { "no" })?;

    if detail.logs.is_empty() {
        writeln!(out, "  no cooking logs")?;
    }
    for log in &detail.logs {
        write!(out, "  - {} (log {})", log.date_label, log.id)?;
        if let Some(by) = &log.created_by {
            write!(out, " by {by}")?;
        }
        if log.photo.is_some() {
            write!(out, " [photo]")?;
        }
        writeln!(out)?;
        if let Some(note) = &log.note {
            writeln!(out, "      {note}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use catalog::{CategoryFilter, JpegPhotoEncoder};
    use recipe_store::{DocumentGateway, LocalGateway, MemoryStorage};

    use super::*;

    fn local_app(json: bool) -> App {
        let gateway = LocalGateway::new(MemoryStorage::new());
        let store = Arc::new(RecipeCollectionStore::new(Arc::new(gateway)));
        App::new(store, Arc::new(JpegPhotoEncoder::default()), SortKey::Newest, json)
    }

    async fn run(app: &mut App, command: Command) -> String {
        let mut out = Vec::new();
        app.run(command, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    fn add(name: &str, category: Option<&str>) -> Command {
        Command::Add(AddArgs {
            name: name.into(),
            url: format!("https://example.com/{name}"),
            category: category.map(Into::into),
        })
    }

    fn list(sort: Option<SortKey>, category: CategoryFilter) -> Command {
        Command::List(ListArgs { sort, category })
    }

    async fn only_id(app: &App) -> String {
        app.store.recipes().await[0].id.to_string()
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(3, 2), "★★★☆☆");
        assert_eq!(stars(0, 5), "☆☆☆☆☆");
    }

    #[tokio::test]
    async fn test_add_rate_and_list() {
        let mut app = local_app(false);
        run(&mut app, add("Curry", Some("Dinner"))).await;
        let id = only_id(&app).await;

        let shown = run(&mut app, Command::Rate { id: id.clone(), stars: 4 }).await;
        assert!(shown.contains("★★★★☆"));

        let listed = run(&mut app, list(None, CategoryFilter::All)).await;
        assert!(listed.starts_with("1 recipes, 0 cooked"));
        assert!(listed.contains("Curry [Dinner] (0 logs)"));
    }

    #[tokio::test]
    async fn test_filter_with_no_match_keeps_counts() {
        let mut app = local_app(true);
        run(&mut app, add("A", None)).await;
        run(&mut app, add("B", None)).await;

        let dessert = CategoryFilter::Category("Dessert".into());
        let output = run(&mut app, list(Some(SortKey::Name), dessert)).await;
        let projection: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(projection["total_count"], 2);
        assert_eq!(projection["cards"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_log_then_show_and_delete_log() {
        let mut app = local_app(false);
        run(&mut app, add("Curry", None)).await;
        let id = only_id(&app).await;

        let logged = run(
            &mut app,
            Command::Log(LogArgs {
                id: id.clone(),
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 5),
                note: Some("Spicy".into()),
                photo: None,
            }),
        )
        .await;
        assert!(logged.starts_with("Logged 2024年1月5日"));

        let shown = run(&mut app, Command::Show { id: id.clone() }).await;
        assert!(shown.contains("cooked:   yes"));
        assert!(shown.contains("2024年1月5日"));
        assert!(shown.contains("Spicy"));
        assert!(shown.contains(&format!("category: {UNCATEGORIZED_LABEL}")));

        let log_id = app.store.recipes().await[0].logs[0].id;
        run(
            &mut app,
            Command::DeleteLog {
                id: id.clone(),
                log_id,
                yes: true,
            },
        )
        .await;
        let shown = run(&mut app, Command::Show { id }).await;
        assert!(shown.contains("no cooking logs"));
        assert!(shown.contains("cooked:   yes"));
    }

    #[tokio::test]
    async fn test_log_with_photo_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dinner.png");
        let mut png = Vec::new();
        image_fixture(&mut png);
        std::fs::write(&path, &png).unwrap();

        let mut app = local_app(true);
        run(&mut app, add("Curry", None)).await;
        let id = only_id(&app).await;

        let output = run(
            &mut app,
            Command::Log(LogArgs {
                id,
                date: None,
                note: None,
                photo: Some(path),
            }),
        )
        .await;
        let entry: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(entry["photo"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    fn image_fixture(out: &mut Vec<u8>) {
        let img = image::RgbImage::from_pixel(1200, 900, image::Rgb([200, 120, 40]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(out), image::ImageFormat::Png)
            .unwrap();
    }

    #[tokio::test]
    async fn test_edit_moves_category() {
        let mut app = local_app(false);
        run(&mut app, add("Miso", Some("Soup"))).await;
        let id = only_id(&app).await;

        let shown = run(
            &mut app,
            Command::Edit(EditArgs {
                id: id.clone(),
                name: Some("Miso Soup".into()),
                url: None,
                category: Some("Starter".into()),
                clear_category: false,
            }),
        )
        .await;
        assert!(shown.starts_with("Miso Soup"));
        assert!(shown.contains("category: Starter"));

        let categories = run(&mut app, Command::Categories).await;
        assert_eq!(categories, "Starter\n");
    }

    #[tokio::test]
    async fn test_edit_without_changes_is_rejected() {
        let mut app = local_app(false);
        run(&mut app, add("Curry", None)).await;
        let id = only_id(&app).await;

        let mut out = Vec::new();
        let result = app
            .run(
                Command::Edit(EditArgs {
                    id,
                    name: None,
                    url: None,
                    category: None,
                    clear_category: false,
                }),
                &mut out,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_recipe_is_an_error() {
        let mut app = local_app(false);
        let mut out = Vec::new();
        let result = app
            .run(Command::Rate { id: "missing".into(), stars: 3 }, &mut out)
            .await;
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_sync_backend_round_trip() {
        let store = Arc::new(RecipeCollectionStore::new(Arc::new(DocumentGateway::new())));
        store.start_sync().await.unwrap();
        store.wait_for_revision(1).await;

        let mut app = App::new(
            Arc::clone(&store),
            Arc::new(JpegPhotoEncoder::default()),
            SortKey::Newest,
            false,
        );
        run(&mut app, add("Curry", None)).await;
        store.wait_until(|r| r.len() == 1).await;

        let listed = run(&mut app, list(None, CategoryFilter::All)).await;
        assert!(listed.contains("Curry"));
        store.stop_sync();
    }

    #[tokio::test]
    async fn test_delete_twice_is_fine() {
        let mut app = local_app(false);
        run(&mut app, add("Curry", None)).await;
        let id = only_id(&app).await;

        run(&mut app, Command::Delete { id: id.clone(), yes: true }).await;
        let again = run(&mut app, Command::Delete { id, yes: true }).await;
        assert!(again.starts_with("Deleted"));
        assert!(app.store.recipes().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_asks_first() {
        let mut app = local_app(false).with_input(std::io::Cursor::new("n\ny\n"));
        run(&mut app, add("Curry", None)).await;
        let id = only_id(&app).await;

        let declined = run(&mut app, Command::Delete { id: id.clone(), yes: false }).await;
        assert_eq!(declined, "Cancelled\n");
        assert_eq!(app.store.recipes().await.len(), 1);

        let confirmed = run(&mut app, Command::Delete { id, yes: false }).await;
        assert!(confirmed.starts_with("Deleted"));
        assert!(app.store.recipes().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_log_without_answer_is_cancelled() {
        let mut app = local_app(true).with_input(std::io::empty());
        run(&mut app, add("Curry", None)).await;
        let id = only_id(&app).await;
        run(
            &mut app,
            Command::Log(LogArgs {
                id: id.clone(),
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 5),
                note: None,
                photo: None,
            }),
        )
        .await;
        let log_id = app.store.recipes().await[0].logs[0].id;

        let output = run(&mut app, Command::DeleteLog { id, log_id, yes: false }).await;
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["cancelled"], true);
        assert_eq!(app.store.recipes().await[0].logs.len(), 1);
    }
}
