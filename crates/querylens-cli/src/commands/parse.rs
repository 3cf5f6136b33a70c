//! Parse command - run one query through the engine.

use querylens_core::{EngineConfig, QueryEngine, QueryResponse};

pub(crate) async fn run(query: &str, json: bool, keywords: bool) -> miette::Result<()> {
    let engine = QueryEngine::new(EngineConfig::from_env());

    let response = if keywords {
        engine.classify(query)
    } else {
        engine.handle(query).await
    }
    .map_err(|e| miette::miette!("{}", e))?;

    if json {
        let out = serde_json::to_string_pretty(&response)
            .map_err(|e| miette::miette!("Failed to serialize response: {}", e))?;
        println!("{}", out);
    } else {
        print_response(&response);
    }

    Ok(())
}

fn print_response(response: &QueryResponse) {
    let record = &response.parsed_query;
    println!("Query:     {}", response.query);
    println!("Item type: {}", record.item_type.as_deref().unwrap_or("-"));
    println!("Material:  {}", record.material.as_deref().unwrap_or("-"));
    println!("Color:     {}", record.color.as_deref().unwrap_or("-"));
    println!();
    println!(
        "Generated in {:.2}s, total {:.4}s{}",
        response.generation_time,
        response.total_time,
        if response.cached { " (cached)" } else { "" }
    );
}
