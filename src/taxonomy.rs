// 🏷️ Taxonomy - Keyword tables as data
// Closed category and origin-bucket enumerations with their keyword lists,
// weights and value-range tables. Loaded once per classifier, never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_range::{ValueBand, ValueRangeTable};

// ============================================================================
// CATEGORY
// ============================================================================

/// Spending category assigned by the category classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Health,
    Education,
    Leisure,
    Housing,
    Clothing,
    Technology,
    Investments,
    Taxes,
    Services,
    /// Fallback when nothing else applies
    Other,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Food,
        Category::Transport,
        Category::Health,
        Category::Education,
        Category::Leisure,
        Category::Housing,
        Category::Clothing,
        Category::Technology,
        Category::Investments,
        Category::Taxes,
        Category::Services,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Leisure => "Leisure",
            Category::Housing => "Housing",
            Category::Clothing => "Clothing",
            Category::Technology => "Technology",
            Category::Investments => "Investments",
            Category::Taxes => "Taxes",
            Category::Services => "Services",
            Category::Other => "Other",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ORIGIN
// ============================================================================

/// Personal-vs-business origin of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Business,
    Personal,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Business => "business",
            Origin::Personal => "personal",
        }
    }

    pub fn opposite(&self) -> Origin {
        match self {
            Origin::Business => Origin::Personal,
            Origin::Personal => Origin::Business,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword bucket feeding one side of the origin classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginBucket {
    // Business side
    Suppliers,
    BusinessServices,
    TaxesAndFees,
    Payroll,
    Infrastructure,
    Equipment,
    SalesRevenue,

    // Personal side
    PersonalFood,
    FamilyHealth,
    FamilyEducation,
    FamilyLeisure,
    PersonalHousing,
    PersonalTransport,
}

impl OriginBucket {
    pub fn side(&self) -> Origin {
        match self {
            OriginBucket::Suppliers
            | OriginBucket::BusinessServices
            | OriginBucket::TaxesAndFees
            | OriginBucket::Payroll
            | OriginBucket::Infrastructure
            | OriginBucket::Equipment
            | OriginBucket::SalesRevenue => Origin::Business,
            OriginBucket::PersonalFood
            | OriginBucket::FamilyHealth
            | OriginBucket::FamilyEducation
            | OriginBucket::FamilyLeisure
            | OriginBucket::PersonalHousing
            | OriginBucket::PersonalTransport => Origin::Personal,
        }
    }

    /// Built-in bucket weight
    pub fn default_weight(&self) -> f64 {
        match self {
            OriginBucket::Suppliers => 1.0,
            OriginBucket::BusinessServices => 0.9,
            OriginBucket::TaxesAndFees => 1.0,
            OriginBucket::Payroll => 0.8,
            OriginBucket::Infrastructure => 0.7,
            OriginBucket::Equipment => 0.6,
            OriginBucket::SalesRevenue => 0.9,
            OriginBucket::PersonalFood => 0.8,
            OriginBucket::FamilyHealth => 0.7,
            OriginBucket::FamilyEducation => 0.6,
            OriginBucket::FamilyLeisure => 0.9,
            OriginBucket::PersonalHousing => 0.8,
            OriginBucket::PersonalTransport => 0.7,
        }
    }
}

// ============================================================================
// CATEGORY TAXONOMY
// ============================================================================

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub category: Category,

    /// Ordered keyword list (normalized form: lower case, no digits)
    pub keywords: Vec<String>,

    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Typical amounts for this category (empty = no value signal)
    #[serde(default)]
    pub value_range: ValueRangeTable,
}

impl CategoryBucket {
    pub fn new(category: Category, keywords: &[&str]) -> Self {
        CategoryBucket {
            category,
            keywords: words(keywords),
            weight: default_weight(),
            value_range: ValueRangeTable::default(),
        }
    }

    pub fn with_value_bands(mut self, bands: Vec<ValueBand>) -> Self {
        self.value_range = ValueRangeTable::plain(bands);
        self
    }
}

/// Category name → keywords, weight and value ranges, in evaluation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTaxonomy {
    pub buckets: Vec<CategoryBucket>,
}

impl CategoryTaxonomy {
    pub fn bucket(&self, category: Category) -> Option<&CategoryBucket> {
        self.buckets.iter().find(|b| b.category == category)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Default for CategoryTaxonomy {
    fn default() -> Self {
        let buckets = vec![
            CategoryBucket::new(
                Category::Food,
                &[
                    "mercado", "supermercado", "padaria", "açougue", "hortifruti",
                    "restaurante", "lanchonete", "pizzaria", "hamburgueria", "delivery",
                    "ifood", "uber eats", "rappi", "mcdonalds", "burger king",
                    "subway", "kfc", "pizza hut", "dominos", "outback",
                    "pao de acucar", "carrefour", "extra", "walmart", "atacadao",
                ],
            )
            .with_value_bands(vec![ValueBand::new(5, 500, 0.1), ValueBand::new(5, 150, 0.2)]),
            CategoryBucket::new(
                Category::Transport,
                &[
                    "uber", "99", "taxi", "combustivel", "gasolina", "etanol",
                    "posto", "shell", "petrobras", "ipiranga", "ale",
                    "estacionamento", "pedagio", "onibus", "metro", "trem",
                    "bilhete unico", "cartao transporte", "veiculo", "carro",
                    "moto", "manutencao", "oficina", "pneu", "oleo",
                ],
            )
            .with_value_bands(vec![ValueBand::new(3, 200, 0.1), ValueBand::new(4, 45, 0.2)]),
            CategoryBucket::new(
                Category::Health,
                &[
                    "farmacia", "drogaria", "hospital", "clinica", "medico",
                    "dentista", "laboratorio", "exame", "consulta", "medicamento",
                    "droga raia", "drogasil", "pacheco", "ultrafarma",
                    "unimed", "amil", "bradesco saude", "sulamerica",
                    "plano de saude", "convenio medico",
                ],
            ),
            CategoryBucket::new(
                Category::Education,
                &[
                    "escola", "faculdade", "universidade", "curso", "aula",
                    "mensalidade", "material escolar", "livro", "apostila",
                    "udemy", "coursera", "alura", "rocketseat", "dio",
                    "ingles", "idioma", "wizard", "ccaa", "cultura inglesa",
                ],
            ),
            CategoryBucket::new(
                Category::Leisure,
                &[
                    "cinema", "teatro", "show", "evento", "festa", "bar",
                    "balada", "clube", "academia", "ginasio", "smartfit",
                    "netflix", "spotify", "amazon prime", "disney plus",
                    "youtube premium", "steam", "playstation", "xbox",
                    "ingresso", "ticket", "viagem", "hotel", "pousada",
                ],
            )
            .with_value_bands(vec![ValueBand::new(10, 1000, 0.1), ValueBand::new(15, 300, 0.2)]),
            CategoryBucket::new(
                Category::Housing,
                &[
                    "aluguel", "condominio", "iptu", "energia", "luz",
                    "agua", "gas", "internet", "telefone", "celular",
                    "limpeza", "detergente", "sabao", "amaciante",
                    "moveis", "eletrodomesticos", "decoracao", "reforma",
                    "construcao", "material construcao", "tinta", "cimento",
                ],
            )
            .with_value_bands(vec![ValueBand::new(50, 5000, 0.1), ValueBand::new(400, 3000, 0.2)]),
            CategoryBucket::new(
                Category::Clothing,
                &[
                    "roupa", "sapato", "tenis", "sandalia", "camisa",
                    "calca", "vestido", "saia", "blusa", "jaqueta",
                    "nike", "adidas", "zara", "hm", "renner", "cea",
                    "riachuelo", "marisa", "lojas americanas", "magazine luiza",
                ],
            ),
            CategoryBucket::new(
                Category::Technology,
                &[
                    "celular", "smartphone", "computador", "notebook", "tablet",
                    "software", "aplicativo", "app", "sistema", "programa",
                    "microsoft", "google", "apple", "samsung", "xiaomi",
                    "iphone", "android", "windows", "office", "adobe",
                ],
            ),
            CategoryBucket::new(
                Category::Investments,
                &[
                    "investimento", "aplicacao", "poupanca", "cdb", "lci",
                    "lca", "tesouro", "acao", "fundo", "renda fixa",
                    "corretora", "xp", "rico", "clear", "inter", "nubank",
                    "btg", "itau", "bradesco", "santander", "banco do brasil",
                ],
            ),
            CategoryBucket::new(
                Category::Taxes,
                &[
                    "imposto", "taxa", "tributo", "irpf", "ipva", "iptu",
                    "iss", "icms", "pis", "cofins", "csll", "irpj",
                    "receita federal", "fazenda", "prefeitura", "detran",
                ],
            ),
            CategoryBucket::new(
                Category::Services,
                &[
                    "servico", "manutencao", "reparo", "conserto", "limpeza",
                    "jardinagem", "pintura", "eletricista", "encanador",
                    "marceneiro", "pedreiro", "domestica", "diarista",
                    "seguranca", "alarme", "monitoramento", "seguro",
                ],
            ),
        ];

        CategoryTaxonomy { buckets }
    }
}

// ============================================================================
// ORIGIN TAXONOMY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginKeywordBucket {
    pub bucket: OriginBucket,
    pub keywords: Vec<String>,
    pub weight: f64,
}

impl OriginKeywordBucket {
    pub fn new(bucket: OriginBucket, keywords: &[&str]) -> Self {
        OriginKeywordBucket {
            bucket,
            keywords: words(keywords),
            weight: bucket.default_weight(),
        }
    }
}

/// Keyword buckets for both origin sides plus each side's value-range table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginTaxonomy {
    pub buckets: Vec<OriginKeywordBucket>,
    pub business_values: ValueRangeTable,
    pub personal_values: ValueRangeTable,
}

impl OriginTaxonomy {
    /// Buckets contributing to one side, in table order
    pub fn buckets_for(&self, side: Origin) -> impl Iterator<Item = &OriginKeywordBucket> {
        self.buckets.iter().filter(move |b| b.bucket.side() == side)
    }

    pub fn values_for(&self, side: Origin) -> &ValueRangeTable {
        match side {
            Origin::Business => &self.business_values,
            Origin::Personal => &self.personal_values,
        }
    }
}

impl Default for OriginTaxonomy {
    fn default() -> Self {
        let buckets = vec![
            OriginKeywordBucket::new(
                OriginBucket::Suppliers,
                &[
                    "fornecedor", "supplier", "distribuidor", "atacado", "atacadista",
                    "industria", "fabrica", "comercial", "ltda", "eireli", "me",
                    "cnpj", "nota fiscal", "nf", "fatura", "pedido", "compra empresarial",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::BusinessServices,
                &[
                    "contador", "contabilidade", "advocacia", "juridico", "consultoria",
                    "marketing", "publicidade", "design", "desenvolvimento", "ti",
                    "manutencao equipamento", "software empresarial", "licenca",
                    "hospedagem", "dominio", "servidor", "cloud", "aws", "azure",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::TaxesAndFees,
                &[
                    "simples nacional", "mei", "irpj", "csll", "pis", "cofins",
                    "iss", "icms", "receita federal", "fazenda estadual",
                    "prefeitura", "alvara", "licenca funcionamento", "bombeiros",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::Payroll,
                &[
                    "salario", "folha pagamento", "inss", "fgts", "vale transporte",
                    "vale refeicao", "plr", "bonus", "comissao", "funcionario",
                    "colaborador", "empregado", "terceirizado", "freelancer",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::Infrastructure,
                &[
                    "aluguel comercial", "escritorio", "loja", "galpao", "deposito",
                    "energia comercial", "agua comercial", "telefone comercial",
                    "internet empresarial", "seguranca empresarial", "limpeza comercial",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::Equipment,
                &[
                    "computador empresarial", "notebook trabalho", "impressora",
                    "scanner", "equipamento", "maquinario", "ferramenta",
                    "veiculo comercial", "caminhao", "van", "moto entrega",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::SalesRevenue,
                &[
                    "venda", "receita", "faturamento", "cliente", "pagamento recebido",
                    "transferencia cliente", "deposito cliente", "pix cliente",
                    "cartao credito", "cartao debito", "boleto pago",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::PersonalFood,
                &[
                    "mercado pessoal", "supermercado casa", "feira", "padaria casa",
                    "restaurante familia", "lanche pessoal", "ifood casa",
                    "delivery pessoal", "groceries", "food personal",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::FamilyHealth,
                &[
                    "medico familia", "dentista pessoal", "farmacia casa",
                    "plano saude familia", "consulta pessoal", "exame pessoal",
                    "medicamento familia", "hospital pessoal",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::FamilyEducation,
                &[
                    "escola filho", "faculdade pessoal", "curso pessoal",
                    "material escolar", "uniforme escola", "mensalidade escola",
                    "livro pessoal", "curso online pessoal",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::FamilyLeisure,
                &[
                    "cinema familia", "teatro pessoal", "viagem pessoal",
                    "hotel pessoal", "passeio familia", "festa pessoal",
                    "presente", "aniversario", "natal", "dia das maes",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::PersonalHousing,
                &[
                    "aluguel casa", "condominio residencial", "iptu residencial",
                    "energia residencial", "agua residencial", "gas residencial",
                    "internet casa", "telefone casa", "celular pessoal",
                ],
            ),
            OriginKeywordBucket::new(
                OriginBucket::PersonalTransport,
                &[
                    "combustivel pessoal", "uber pessoal", "taxi pessoal",
                    "manutencao carro pessoal", "ipva", "seguro carro pessoal",
                    "estacionamento pessoal", "pedagio pessoal",
                ],
            ),
        ];

        OriginTaxonomy {
            buckets,
            business_values: ValueRangeTable::business(),
            personal_values: ValueRangeTable::personal(),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_name("food"), Some(Category::Food));
        assert_eq!(Category::from_name("Alimentação"), None);
    }

    #[test]
    fn test_default_taxonomy_covers_every_category_but_other() {
        let taxonomy = CategoryTaxonomy::default();

        assert_eq!(taxonomy.len(), Category::ALL.len() - 1);
        assert!(taxonomy.bucket(Category::Other).is_none());
        assert!(taxonomy
            .buckets
            .iter()
            .all(|b| !b.keywords.is_empty() && b.weight == 1.0));
    }

    #[test]
    fn test_category_value_tables() {
        let taxonomy = CategoryTaxonomy::default();

        assert_eq!(taxonomy.bucket(Category::Food).unwrap().value_range.bands.len(), 2);
        assert!(taxonomy.bucket(Category::Taxes).unwrap().value_range.bands.is_empty());
    }

    #[test]
    fn test_origin_buckets_split_by_side() {
        let taxonomy = OriginTaxonomy::default();

        assert_eq!(taxonomy.buckets_for(Origin::Business).count(), 7);
        assert_eq!(taxonomy.buckets_for(Origin::Personal).count(), 6);

        let suppliers = taxonomy
            .buckets
            .iter()
            .find(|b| b.bucket == OriginBucket::Suppliers)
            .unwrap();
        assert_eq!(suppliers.weight, 1.0);
        assert!(suppliers.keywords.contains(&"fornecedor".to_string()));

        let leisure = taxonomy
            .buckets
            .iter()
            .find(|b| b.bucket == OriginBucket::FamilyLeisure)
            .unwrap();
        assert_eq!(leisure.weight, 0.9);
    }

    #[test]
    fn test_origin_opposite() {
        assert_eq!(Origin::Business.opposite(), Origin::Personal);
        assert_eq!(Origin::Personal.opposite(), Origin::Business);
    }

    #[test]
    fn test_taxonomy_serializes_with_stable_names() {
        let json = serde_json::to_string(&OriginBucket::BusinessServices).unwrap();
        assert_eq!(json, "\"business_services\"");

        let json = serde_json::to_string(&Category::Food).unwrap();
        assert_eq!(json, "\"Food\"");
    }
}
