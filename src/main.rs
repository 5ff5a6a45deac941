use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use gamesage::agent::ResearchAgent;
use gamesage::config::AgentConfig;
use gamesage::llm::LlmClient;
use gamesage::reasoner::LlmReasoner;
use gamesage::state::StateStore;
use gamesage::store::{EmbeddingStore, GameRecordStore, KeywordStore};
use gamesage::websearch::{NoWebSearch, TavilySearch, WebSearchProvider};

const DEMO_QUERIES: &[&str] = &[
    "When was Pokémon Gold and Silver released?",
    "Which company published Gran Turismo?",
    "What platform was Super Mario 64 released for?",
    "Was Mortal Kombat X released for PlayStation 5?",
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let demo = args.iter().any(|a| a == "--demo");
    let offline = args.iter().any(|a| a == "--offline");

    tracing::info!("gamesage research agent starting...");

    let config = AgentConfig::load();
    let mut agent = build_agent(&config, offline).await?;

    if demo {
        run_demo(&mut agent).await
    } else {
        run_interactive(&mut agent).await
    }
}

/// Wire the collaborators. Flags pick implementations, never decision
/// logic: `--offline` swaps the embedding store for the keyword store.
async fn build_agent(config: &AgentConfig, offline: bool) -> Result<ResearchAgent> {
    let llm = LlmClient::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
        config.llm_temperature,
    );

    if config.llm_api_key.is_none() {
        tracing::warn!("No LLM API key configured; set OPENAI_API_KEY unless the endpoint is local");
    }

    let store: Arc<dyn GameRecordStore> = if offline {
        tracing::info!("Offline wiring: keyword store over {}", config.games_dir);
        Arc::new(KeywordStore::from_directory(Path::new(&config.games_dir))?)
    } else {
        Arc::new(
            EmbeddingStore::open(
                llm.clone(),
                &config.embedding_model,
                Path::new(&config.games_dir),
                Path::new(&config.data_dir),
            )
            .await
            .context("Failed to open the game knowledge base")?,
        )
    };

    let web: Arc<dyn WebSearchProvider> = match &config.tavily_api_key {
        Some(key) if !key.trim().is_empty() => Arc::new(TavilySearch::new(key.clone())),
        _ => {
            tracing::warn!("TAVILY_API_KEY not set; web fallback will degrade to local evidence");
            Arc::new(NoWebSearch)
        }
    };

    let reasoner = Arc::new(LlmReasoner::new(llm));
    let state_store = StateStore::new(Path::new(&config.data_dir));

    let agent = ResearchAgent::new(store, web, reasoner, state_store, config.clone())?;
    if !agent.state().is_empty() {
        tracing::info!("Resuming conversation with {} prior turn(s)", agent.state().turn_count);
    }
    Ok(agent)
}

async fn run_demo(agent: &mut ResearchAgent) -> Result<()> {
    for query in DEMO_QUERIES {
        println!("\n> {}", query);
        match agent.process_query(query).await {
            Ok(response) => print_response(&response),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

async fn run_interactive(agent: &mut ResearchAgent) -> Result<()> {
    println!("Ask me anything about video games!");
    println!("Type 'quit', 'exit', or 'q' to stop");
    println!("Type 'history' to see conversation history");
    println!("Type 'clear' to clear conversation history");

    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Failed to read input")? == 0 {
            break; // end of input
        }
        let input = line.trim();

        match input {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "history" => {
                print_history(agent);
                continue;
            }
            "clear" => {
                agent.clear_conversation()?;
                println!("Conversation history cleared.");
                continue;
            }
            query => match agent.process_query(query).await {
                Ok(response) => print_response(&response),
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_response(response: &gamesage::AgentResponse) {
    println!("{}", response.answer);
    println!(
        "\n  confidence: {:.2} | method: {} | sources: {}",
        response.confidence,
        response.retrieval_method.as_str(),
        if response.sources.is_empty() {
            "none".to_string()
        } else {
            response.sources.join(", ")
        }
    );
}

fn print_history(agent: &ResearchAgent) {
    let state = agent.state();
    if state.is_empty() {
        println!("No conversation history yet.");
        return;
    }
    for (i, turn) in state.turns.iter().enumerate() {
        println!(
            "{}. [{}] {} -> {}",
            i + 1,
            turn.response.retrieval_method.as_str(),
            turn.query,
            turn.response.answer
        );
    }
}
